//! Receiver stage: datagrams in, anomaly reports out
//!
//! ## State Machine
//!
//! ```text
//! LISTEN ─▶ DECODE ─▶ UPDATE_STATE ─▶ CLASSIFY ─┬─ normal ───▶ LISTEN
//!   ▲         │ bad datagram                     └─ anomalous ─▶ REPORT ─▶ LISTEN
//!   └─────────┘ (logged, counted)
//! ```
//!
//! REPORT borrows a slot, writes the snapshot into it and hands it to the
//! channel. No slot, or no room under [`BackpressurePolicy::Reject`], means the
//! report is dropped and counted; the aggregate state is already updated and
//! stays correct either way.
//!
//! The loop only ends on a transport failure, on the sender stage going away,
//! or when the shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::aggregate::{AggregateState, Snapshot};
use crate::channel::{BackpressurePolicy, HandoffSender, PutError};
use crate::classifier::NormalRange;
use crate::constants::MAX_PACKET_SIZE;
use crate::errors::{DecodeError, PipelineError, PipelineResult};
use crate::pool::SlotPool;
use crate::report::AnomalyReport;
use crate::stats::PipelineStats;
use crate::traits::{ProtocolCodec, Transport};

/// Receiver stage settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Normal operating range
    pub range: NormalRange,
    /// Full-channel behavior
    pub policy: BackpressurePolicy,
    /// Largest datagram accepted; longer ones are discarded unread
    pub max_packet_size: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            range: NormalRange::default(),
            policy: BackpressurePolicy::default(),
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

/// What happened to one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Not a valid reading; aggregate state untouched
    Discarded,
    /// Reading recorded, within range
    Normal(Snapshot),
    /// Reading recorded, report handed to the sender stage
    Queued(AnomalyReport),
    /// Reading recorded, report dropped for lack of a slot or channel room
    Dropped(AnomalyReport),
}

/// Decodes telemetry, maintains aggregate state and emits anomaly reports
pub struct ReceiverStage<T, C> {
    transport: T,
    codec: C,
    config: ReceiverConfig,
    state: AggregateState,
    pool: SlotPool,
    channel: HandoffSender,
    stats: Arc<PipelineStats>,
}

impl<T: Transport, C: ProtocolCodec> ReceiverStage<T, C> {
    /// Assemble a receiver stage
    pub fn new(
        transport: T,
        codec: C,
        config: ReceiverConfig,
        pool: SlotPool,
        channel: HandoffSender,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            transport,
            codec,
            config,
            state: AggregateState::new(),
            pool,
            channel,
            stats,
        }
    }

    /// Current aggregate statistics
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Receive loop
    ///
    /// Returns `Ok(())` when `shutdown` resolves, dropping this stage's end of
    /// the channel so the sender stage can drain and stop.
    pub async fn run<F>(mut self, shutdown: F) -> PipelineResult<()>
    where
        F: Future<Output = ()>,
    {
        // One spare byte tells a full datagram from a truncated one
        let mut buf = vec![0u8; self.config.max_packet_size + 1];
        tokio::pin!(shutdown);

        log::info!(
            "receiver stage listening, normal range [{}, {}]",
            self.config.range.low,
            self.config.range.high
        );

        loop {
            let (len, source) = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    log::info!("receiver stage shutting down");
                    return Ok(());
                }
                received = self.transport.receive(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        log::error!("receive failed, stopping receiver stage: {}", e);
                        return Err(e.into());
                    }
                },
            };

            self.handle_datagram(&buf[..len], source).await?;
        }
    }

    /// Process one datagram
    ///
    /// Only a closed channel is an error; everything else is an outcome.
    pub async fn handle_datagram(
        &mut self,
        bytes: &[u8],
        source: SocketAddr,
    ) -> PipelineResult<ReceiveOutcome> {
        PipelineStats::bump(&self.stats.received);
        log::trace!("received {} bytes from {}", bytes.len(), source);

        if bytes.len() > self.config.max_packet_size {
            let err = DecodeError::Oversized {
                len: bytes.len(),
                limit: self.config.max_packet_size,
            };
            return Ok(self.discard(source, err));
        }

        let message = match self.codec.decode(bytes) {
            Ok(message) => message,
            Err(e) => return Ok(self.discard(source, e)),
        };

        log::debug!(
            "message from {}: id={} code={} content_format={:?} payload_len={} options={}",
            source,
            message.message_id,
            message.method_code,
            message.content_format,
            message.payload.len(),
            message.option_count
        );

        match message.reading() {
            Ok(reading) => self.handle_reading(reading).await,
            Err(e) => Ok(self.discard(source, e)),
        }
    }

    /// Record, classify and, if anomalous, report one reading
    pub async fn handle_reading(&mut self, reading: i32) -> PipelineResult<ReceiveOutcome> {
        let snapshot = self.state.record(reading);
        PipelineStats::bump(&self.stats.readings);

        if !self.config.range.classify(reading).is_anomalous() {
            return Ok(ReceiveOutcome::Normal(snapshot));
        }

        PipelineStats::bump(&self.stats.anomalies);
        let report = AnomalyReport::new(reading, snapshot);
        log::info!(
            "anomalous reading {} (range [{}, {}], {} readings so far)",
            reading,
            self.config.range.low,
            self.config.range.high,
            snapshot.count
        );

        let mut slot = match self.pool.try_borrow() {
            Ok(slot) => slot,
            Err(e) => {
                log::warn!("dropping report for reading {}: {}", reading, e);
                PipelineStats::bump(&self.stats.reports_dropped);
                return Ok(ReceiveOutcome::Dropped(report));
            }
        };
        slot.write(report);

        let handed_off = match self.config.policy {
            BackpressurePolicy::Block => self.channel.put(slot).await,
            BackpressurePolicy::Reject => self.channel.try_put(slot),
        };

        match handed_off {
            Ok(()) => {
                PipelineStats::bump(&self.stats.reports_queued);
                Ok(ReceiveOutcome::Queued(report))
            }
            Err(PutError::Full(slot)) => {
                drop(slot);
                log::warn!("dropping report for reading {}: hand-off channel full", reading);
                PipelineStats::bump(&self.stats.reports_dropped);
                Ok(ReceiveOutcome::Dropped(report))
            }
            Err(PutError::Closed(slot)) => {
                drop(slot);
                log::error!("sender stage gone, stopping receiver stage");
                Err(PipelineError::ChannelClosed)
            }
        }
    }

    fn discard(&self, source: SocketAddr, err: DecodeError) -> ReceiveOutcome {
        log::warn!("discarding datagram from {}: {}", source, err);
        PipelineStats::bump(&self.stats.decode_failures);
        ReceiveOutcome::Discarded
    }
}
