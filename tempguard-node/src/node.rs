//! Sensor node: two UDP sockets around one pipeline
//!
//! [`Node::bind`] resolves the configuration and binds the listening socket
//! and an ephemeral outbound socket; [`Node::run_until`] runs the pipeline
//! until a shutdown signal, logging stats along the way.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use tempguard_connectors::{CoapCodec, UdpTransport};
use tempguard_core::{Pipeline, PipelineConfig, PipelineStats, StatsSnapshot};

use crate::config::NodeConfig;

/// A bound, not yet running node.
pub struct Node {
    pipeline: PipelineConfig,
    stats_interval: Option<Duration>,
    inbound: Arc<UdpTransport>,
    outbound: Arc<UdpTransport>,
}

impl Node {
    /// Validate `config` and bind both sockets.
    pub async fn bind(config: &NodeConfig) -> Result<Self> {
        config.log_warnings();
        let pipeline = config
            .to_pipeline_config(seed_message_id())
            .context("invalid node configuration")?;
        let listen = config.listen_addr()?;

        let inbound = UdpTransport::bind(listen)
            .await
            .context("binding sensor listener")?;
        let unspecified: SocketAddr = if listen.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let outbound = UdpTransport::bind(unspecified)
            .await
            .context("binding report socket")?;

        tracing::info!(
            listen = %inbound.local_addr()?,
            outbound = %outbound.local_addr()?,
            collector = %pipeline.sender.collector,
            uri_path = %pipeline.sender.uri_path,
            node_id = %pipeline.sender.node_id,
            "node bound",
        );
        tracing::info!(
            low = pipeline.range.low,
            high = pipeline.range.high,
            pool_capacity = pipeline.pool_capacity,
            channel_capacity = pipeline.channel_capacity,
            backpressure = ?pipeline.policy,
            "pipeline configured",
        );

        Ok(Self {
            pipeline,
            stats_interval: config.stats_interval(),
            inbound: Arc::new(inbound),
            outbound: Arc::new(outbound),
        })
    }

    /// Address sensors send readings to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inbound.local_addr()?)
    }

    /// Run until `signal` resolves, then drain and return the final stats.
    pub async fn run_until<F>(self, signal: F) -> Result<StatsSnapshot>
    where
        F: Future<Output = ()>,
    {
        let handle = Pipeline::new(
            self.pipeline,
            Arc::clone(&self.inbound),
            Arc::clone(&self.outbound),
            CoapCodec::new(),
        )?
        .spawn();
        let stats = handle.stats();
        let pool = handle.pool().clone();
        let channel = handle.channel_stats();

        let reporter = self
            .stats_interval
            .map(|period| tokio::spawn(log_stats_every(Arc::clone(&stats), period)));

        let result = handle.run_until(signal).await;

        if let Some(reporter) = reporter {
            reporter.abort();
        }

        let snapshot = stats.snapshot();
        log_stats(&snapshot, "final pipeline stats");
        let slots = pool.stats_snapshot();
        tracing::info!(
            capacity = slots.capacity,
            peak_in_use = slots.peak_in_use,
            exhausted = slots.exhausted,
            "final slot pool stats",
        );
        let queue = channel.snapshot();
        tracing::info!(
            capacity = queue.capacity,
            accepted = queue.accepted,
            delivered = queue.delivered,
            rejected = queue.rejected,
            max_depth = queue.max_depth,
            "final hand-off channel stats",
        );
        let inbound = self.inbound.stats();
        let outbound = self.outbound.stats();
        tracing::info!(
            datagrams_received = inbound.datagrams_received,
            bytes_received = inbound.bytes_received,
            messages_sent = outbound.messages_sent,
            messages_failed = outbound.messages_failed,
            bytes_sent = outbound.bytes_sent,
            "final socket stats",
        );

        result.context("pipeline stopped with an error")?;
        Ok(snapshot)
    }
}

async fn log_stats_every(stats: Arc<PipelineStats>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // First tick fires immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        log_stats(&stats.snapshot(), "pipeline stats");
    }
}

fn log_stats(snap: &StatsSnapshot, message: &str) {
    tracing::info!(
        received = snap.received,
        decode_failures = snap.decode_failures,
        readings = snap.readings,
        anomalies = snap.anomalies,
        reports_queued = snap.reports_queued,
        reports_dropped = snap.reports_dropped,
        reports_sent = snap.reports_sent,
        encode_failures = snap.encode_failures,
        send_failures = snap.send_failures,
        "{}",
        message,
    );
}

/// Starting message id, so restarts do not reuse recent ids.
fn seed_message_id() -> u16 {
    (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        & 0xFFFF) as u16
}
