//! Sender stage: anomaly reports out to the collector
//!
//! ## State Machine
//!
//! ```text
//! WAIT ─▶ DEQUEUE ─▶ FORMAT ─▶ BUILD ─▶ SEND ─▶ RELEASE ─▶ WAIT
//!                      │         │        │        ▲
//!                      └─────────┴────────┴────────┘
//!                       failure: log, count, release
//! ```
//!
//! A report that cannot be formatted, built or sent is lost, never retried,
//! and its slot goes back to the pool all the same. A collector that is down
//! therefore costs reports, not memory.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::channel::HandoffReceiver;
use crate::constants::{DEFAULT_COLLECTOR_ADDR, DEFAULT_NODE_ID, DEFAULT_URI_PATH};
use crate::errors::{PipelineError, PipelineResult, TransportError};
use crate::pool::Slot;
use crate::report::{self, AnomalyReport, NodeId};
use crate::stats::PipelineStats;
use crate::traits::{OutboundRequest, ProtocolCodec, Transport};

/// Sender stage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Where reports go
    pub collector: SocketAddr,
    /// Resource path on the collector
    pub uri_path: String,
    /// Value of every report's `id` field
    pub node_id: NodeId,
    /// Mark requests confirmable
    pub confirmable: bool,
    /// Upper bound on one send; `None` waits as long as the socket does
    pub send_timeout: Option<Duration>,
    /// Message id of the first report
    pub first_message_id: u16,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            collector: DEFAULT_COLLECTOR_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5688))),
            uri_path: DEFAULT_URI_PATH.to_string(),
            node_id: report::node_id(DEFAULT_NODE_ID).unwrap_or_default(),
            confirmable: true,
            send_timeout: None,
            first_message_id: 0,
        }
    }
}

/// What happened to one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Datagram of `bytes` bytes left the socket
    Sent {
        /// Datagram size
        bytes: usize,
        /// Message id used
        message_id: u16,
    },
    /// Payload or message could not be built
    EncodeFailed,
    /// Transport refused or timed out
    SendFailed,
}

/// Formats queued reports and transmits them to the collector
pub struct SenderStage<T, C> {
    transport: T,
    codec: C,
    config: SenderConfig,
    channel: HandoffReceiver,
    stats: Arc<PipelineStats>,
    next_message_id: u16,
}

impl<T: Transport, C: ProtocolCodec> SenderStage<T, C> {
    /// Assemble a sender stage
    pub fn new(
        transport: T,
        codec: C,
        config: SenderConfig,
        channel: HandoffReceiver,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let next_message_id = config.first_message_id;
        Self {
            transport,
            codec,
            config,
            channel,
            stats,
            next_message_id,
        }
    }

    /// Send loop
    ///
    /// Runs until the receiver stage drops its end of the channel, after
    /// forwarding everything still queued.
    pub async fn run(mut self) -> PipelineResult<()> {
        log::info!(
            "sender stage forwarding to {}{}",
            self.config.collector,
            self.config.uri_path
        );

        while let Some(slot) = self.channel.get().await {
            self.forward(slot).await;
        }

        log::info!("hand-off channel closed, sender stage stopping");
        Ok(())
    }

    /// Format, build and send one report, then release its slot
    pub async fn forward(&mut self, slot: Slot) -> SendOutcome {
        let report = slot.report();
        let outcome = self.transmit(&report).await;

        // released whatever the outcome
        drop(slot);

        match outcome {
            Ok((bytes, message_id)) => {
                PipelineStats::bump(&self.stats.reports_sent);
                log::info!(
                    "sent report for reading {} ({} bytes, mid {}) to {}",
                    report.reading,
                    bytes,
                    message_id,
                    self.config.collector
                );
                SendOutcome::Sent { bytes, message_id }
            }
            Err(PipelineError::Encode(e)) => {
                PipelineStats::bump(&self.stats.encode_failures);
                log::error!("lost report for reading {}: {}", report.reading, e);
                SendOutcome::EncodeFailed
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.send_failures);
                log::error!(
                    "lost report for reading {}: send to {} failed: {}",
                    report.reading,
                    self.config.collector,
                    e
                );
                SendOutcome::SendFailed
            }
        }
    }

    async fn transmit(&mut self, report: &AnomalyReport) -> PipelineResult<(usize, u16)> {
        let payload = report.payload(&self.config.node_id).to_json()?;
        let message_id = self.take_message_id();

        let request = OutboundRequest {
            uri_path: &self.config.uri_path,
            message_id,
            confirmable: self.config.confirmable,
            payload: &payload,
        };
        let datagram = self.codec.encode(&request)?;
        log::debug!(
            "built {} byte message (mid {}) for {}",
            datagram.len(),
            message_id,
            self.config.uri_path
        );

        let send = self.transport.send_to(&datagram, self.config.collector);
        let sent = match self.config.send_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| TransportError::Timeout(limit.as_millis() as u64))??,
            None => send.await?,
        };

        if sent < datagram.len() {
            return Err(TransportError::ShortSend {
                sent,
                expected: datagram.len(),
            }
            .into());
        }
        Ok((sent, message_id))
    }

    fn take_message_id(&mut self) -> u16 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }
}
