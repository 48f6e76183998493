//! Core anomaly pipeline for TempGuard sensor nodes
//!
//! Receives integer temperature readings, keeps running statistics, flags
//! readings outside the normal range and forwards an anomaly report for each
//! one to a collector.
//!
//! Key constraints:
//! - Report memory is preallocated and bounded (slot pool)
//! - Receiving never waits on the collector (separate sender stage)
//! - A bad datagram or a lost report never corrupts the statistics
//!
//! ```no_run
//! use tempguard_core::{AggregateState, NormalRange, AnomalyReport};
//!
//! let range = NormalRange::default();
//! let mut state = AggregateState::new();
//!
//! for reading in [65, 68, 58] {
//!     let snapshot = state.record(reading);
//!     if range.classify(reading).is_anomalous() {
//!         let report = AnomalyReport::new(reading, snapshot);
//!         // hand the report to the sender stage
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod channel;
pub mod classifier;
pub mod constants;
pub mod errors;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod stages;
pub mod stats;
pub mod traits;

// Public API
pub use aggregate::{AggregateState, Snapshot};
pub use channel::{handoff, BackpressurePolicy, ChannelStats, ChannelStatsSnapshot, HandoffReceiver, HandoffSender};
pub use classifier::{classify, Classification, NormalRange};
pub use errors::{
    ConfigError, DecodeError, EncodeError, PipelineError, PipelineResult, TransportError,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineHandle};
pub use pool::{Slot, SlotPool};
pub use report::{AnomalyReport, NodeId, ReportPayload};
pub use stages::{ReceiverConfig, ReceiverStage, SenderConfig, SenderStage};
pub use stats::{PipelineStats, StatsSnapshot};
pub use traits::{InboundMessage, OutboundRequest, ProtocolCodec, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
