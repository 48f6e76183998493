//! Pipeline assembly and task lifecycle
//!
//! [`Pipeline::new`] wires one slot pool, one hand-off channel and the two
//! stages together; [`Pipeline::spawn`] starts each stage as a tokio task and
//! returns a [`PipelineHandle`] for stopping them.
//!
//! ## Shutdown Order
//!
//! 1. The receiver is told to stop and returns, dropping its channel end.
//! 2. The sender drains whatever is still queued, sees the channel close and
//!    returns.
//!
//! No report that made it into the channel is abandoned by a clean shutdown.
//!
//! ```rust,no_run
//! use tempguard_core::pipeline::{Pipeline, PipelineConfig};
//! # use tempguard_core::traits::{Transport, ProtocolCodec};
//! # async fn run<T: Transport + 'static, C: ProtocolCodec + Clone + 'static>(
//! #     inbound: T, outbound: T, codec: C,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineConfig::default(), inbound, outbound, codec)?;
//! let handle = pipeline.spawn();
//!
//! // ... until it is time to stop
//! handle.run_until(async { /* shutdown signal */ }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};

use crate::channel::{handoff, BackpressurePolicy, ChannelStats};
use crate::classifier::NormalRange;
use crate::constants::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_POOL_CAPACITY, MAX_PACKET_SIZE};
use crate::errors::{ConfigError, PipelineError, PipelineResult};
use crate::pool::SlotPool;
use crate::stages::{ReceiverConfig, ReceiverStage, SenderConfig, SenderStage};
use crate::stats::PipelineStats;
use crate::traits::{ProtocolCodec, Transport};

/// Everything needed to build a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Normal operating range
    pub range: NormalRange,
    /// Full-channel behavior
    pub policy: BackpressurePolicy,
    /// Report slots
    pub pool_capacity: usize,
    /// Hand-off channel capacity
    pub channel_capacity: usize,
    /// Largest datagram accepted
    pub max_packet_size: usize,
    /// Outbound settings
    pub sender: SenderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            range: NormalRange::default(),
            policy: BackpressurePolicy::default(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_packet_size: MAX_PACKET_SIZE,
            sender: SenderConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("pool_capacity"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("channel_capacity"));
        }
        if self.max_packet_size == 0 {
            return Err(ConfigError::ZeroCapacity("max_packet_size"));
        }
        Ok(())
    }
}

/// Both stages, wired but not yet running
pub struct Pipeline<T, C> {
    receiver: ReceiverStage<T, C>,
    sender: SenderStage<T, C>,
    pool: SlotPool,
    channel: Arc<ChannelStats>,
    stats: Arc<PipelineStats>,
}

impl<T, C> Pipeline<T, C>
where
    T: Transport + 'static,
    C: ProtocolCodec + Clone + 'static,
{
    /// Build a pipeline receiving on `inbound` and sending on `outbound`
    pub fn new(config: PipelineConfig, inbound: T, outbound: T, codec: C) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.channel_capacity < config.pool_capacity {
            log::warn!(
                "channel capacity {} below pool capacity {}: the channel, not the pool, bounds in-flight reports",
                config.channel_capacity,
                config.pool_capacity
            );
        }

        let pool = SlotPool::new(config.pool_capacity);
        let (tx, rx) = handoff(config.channel_capacity);
        let stats = Arc::new(PipelineStats::new());
        let channel = tx.stats();

        let receiver = ReceiverStage::new(
            inbound,
            codec.clone(),
            ReceiverConfig {
                range: config.range,
                policy: config.policy,
                max_packet_size: config.max_packet_size,
            },
            pool.clone(),
            tx,
            Arc::clone(&stats),
        );
        let sender = SenderStage::new(outbound, codec, config.sender, rx, Arc::clone(&stats));

        Ok(Self {
            receiver,
            sender,
            pool,
            channel,
            stats,
        })
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// The slot pool
    pub fn pool(&self) -> SlotPool {
        self.pool.clone()
    }

    /// Hand-off channel counters
    pub fn channel_stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.channel)
    }

    /// Start both stages on the current tokio runtime
    pub fn spawn(self) -> PipelineHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let receiver = tokio::spawn(self.receiver.run(async move {
            // A dropped handle counts as a shutdown request
            let _ = shutdown_rx.await;
        }));
        let sender = tokio::spawn(self.sender.run());

        PipelineHandle {
            receiver,
            sender,
            shutdown: shutdown_tx,
            pool: self.pool,
            channel: self.channel,
            stats: self.stats,
        }
    }
}

/// Running pipeline
pub struct PipelineHandle {
    receiver: JoinHandle<PipelineResult<()>>,
    sender: JoinHandle<PipelineResult<()>>,
    shutdown: oneshot::Sender<()>,
    pool: SlotPool,
    channel: Arc<ChannelStats>,
    stats: Arc<PipelineStats>,
}

impl PipelineHandle {
    /// Shared counters
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// The slot pool
    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Hand-off channel counters
    pub fn channel_stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.channel)
    }

    /// Run until `signal` resolves or the receiver stage stops by itself
    ///
    /// Either way the sender is allowed to drain before this returns. The
    /// first stage error wins.
    pub async fn run_until<F: Future<Output = ()>>(self, signal: F) -> PipelineResult<()> {
        let PipelineHandle {
            mut receiver,
            sender,
            shutdown,
            ..
        } = self;

        let receiver_result = tokio::select! {
            _ = signal => {
                let _ = shutdown.send(());
                joined(receiver.await)
            }
            result = &mut receiver => joined(result),
        };

        let sender_result = joined(sender.await);
        receiver_result.and(sender_result)
    }

    /// Stop now and wait for the sender to drain
    pub async fn shutdown(self) -> PipelineResult<()> {
        self.run_until(async {}).await
    }
}

fn joined(result: Result<PipelineResult<()>, JoinError>) -> PipelineResult<()> {
    result.map_err(|e| PipelineError::Task(e.to_string()))?
}
