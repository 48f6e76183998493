//! Pipeline counters shared by both stages
//!
//! Track pipeline health without impacting performance. Every counter is a
//! relaxed atomic; a [`StatsSnapshot`] is a consistent-enough copy for logs.

use core::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the receiver and sender stages
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Datagrams received
    pub received: AtomicU64,
    /// Datagrams discarded by the decoder
    pub decode_failures: AtomicU64,
    /// Readings folded into the aggregate state
    pub readings: AtomicU64,
    /// Readings classified anomalous
    pub anomalies: AtomicU64,
    /// Reports handed to the sender stage
    pub reports_queued: AtomicU64,
    /// Reports dropped for lack of a slot or channel room
    pub reports_dropped: AtomicU64,
    /// Reports transmitted
    pub reports_sent: AtomicU64,
    /// Reports lost to encode errors
    pub encode_failures: AtomicU64,
    /// Reports lost to send errors
    pub send_failures: AtomicU64,
}

impl PipelineStats {
    /// Fresh zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reports lost anywhere between detection and transmission
    pub fn lost_reports(&self) -> u64 {
        self.snapshot().lost_reports()
    }

    /// Copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            received: load(&self.received),
            decode_failures: load(&self.decode_failures),
            readings: load(&self.readings),
            anomalies: load(&self.anomalies),
            reports_queued: load(&self.reports_queued),
            reports_dropped: load(&self.reports_dropped),
            reports_sent: load(&self.reports_sent),
            encode_failures: load(&self.encode_failures),
            send_failures: load(&self.send_failures),
        }
    }
}

/// Plain copy of [`PipelineStats`], same fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub received: u64,
    pub decode_failures: u64,
    pub readings: u64,
    pub anomalies: u64,
    pub reports_queued: u64,
    pub reports_dropped: u64,
    pub reports_sent: u64,
    pub encode_failures: u64,
    pub send_failures: u64,
}

impl StatsSnapshot {
    /// Reports lost anywhere between detection and transmission
    pub fn lost_reports(&self) -> u64 {
        self.reports_dropped + self.encode_failures + self.send_failures
    }
}
