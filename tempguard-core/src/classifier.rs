//! Normal-range classifier
//!
//! Decides whether a reading is worth reporting. A reading is anomalous when
//! it lies strictly outside the configured range; the bounds themselves are
//! normal.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HIGH_BOUND, DEFAULT_LOW_BOUND};

/// Outcome of classifying one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    /// Within the normal range
    Normal,
    /// Outside the normal range; must be reported
    Anomalous,
}

impl Classification {
    /// Shorthand for `== Classification::Anomalous`
    pub fn is_anomalous(self) -> bool {
        self == Self::Anomalous
    }
}

/// Classify `reading` against `[low, high]`
pub fn classify(reading: i32, low: i32, high: i32) -> Classification {
    if reading < low || reading > high {
        Classification::Anomalous
    } else {
        Classification::Normal
    }
}

/// Inclusive normal operating range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalRange {
    /// Lowest normal reading
    pub low: i32,
    /// Highest normal reading
    pub high: i32,
}

impl Default for NormalRange {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_BOUND,
            high: DEFAULT_HIGH_BOUND,
        }
    }
}

impl NormalRange {
    /// Create a range, swapping the bounds if given in the wrong order
    pub fn new(low: i32, high: i32) -> Self {
        let (low, high) = if low > high { (high, low) } else { (low, high) };
        Self { low, high }
    }

    /// Classify a reading against this range
    pub fn classify(&self, reading: i32) -> Classification {
        classify(reading, self.low, self.high)
    }
}
