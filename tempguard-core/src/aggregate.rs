//! Running Statistics over All Observed Readings
//!
//! ## Overview
//!
//! A node keeps four numbers for its whole lifetime: the lowest and highest
//! reading, how many readings it has seen and their sum. They are owned by the
//! receiver stage and changed in exactly one place, [`AggregateState::record`],
//! which hands back a [`Snapshot`] of the post-update values. Anything outside
//! the receiver works from snapshots, never from the live fields.
//!
//! ## Update Policy
//!
//! The bounds are updated with a single comparison chain:
//!
//! ```text
//! if reading < minimum      → minimum = reading
//! else if reading > maximum → maximum = reading
//! ```
//!
//! so one reading can move at most one bound. The very first reading always
//! lands in `minimum`, leaving `maximum` at its sentinel until a later reading
//! exceeds it, as the node firmware does.
//!
//! ## Overflow
//!
//! `count` and `total` saturate instead of wrapping. With `i32` readings and an
//! `i64` total, saturation needs billions of extreme readings; a saturated
//! total is reported once through the log.
//!
//! ```rust
//! use tempguard_core::aggregate::AggregateState;
//!
//! let mut state = AggregateState::new();
//! state.record(65);
//! state.record(68);
//! let snap = state.record(58);
//!
//! assert_eq!(snap.minimum, 58);
//! assert_eq!(snap.maximum, 68);
//! assert_eq!(snap.average(), Some(63));
//! ```

use serde::Serialize;

/// Initial `minimum`, larger than any valid reading
pub const MINIMUM_SENTINEL: i32 = i32::MAX;

/// Initial `maximum`, smaller than any valid reading
pub const MAXIMUM_SENTINEL: i32 = i32::MIN;

/// Point-in-time copy of the aggregate statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Lowest reading observed
    pub minimum: i32,
    /// Highest reading observed
    pub maximum: i32,
    /// Number of readings observed
    pub count: u64,
    /// Sum of all readings observed
    pub total: i64,
}

impl Snapshot {
    /// Integer mean of all readings, `None` before the first reading
    pub fn average(&self) -> Option<i64> {
        if self.count == 0 {
            return None;
        }
        // count saturates at u64::MAX, which does not fit i64; clamp
        let divisor = i64::try_from(self.count).unwrap_or(i64::MAX);
        Some(self.total / divisor)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            minimum: MINIMUM_SENTINEL,
            maximum: MAXIMUM_SENTINEL,
            count: 0,
            total: 0,
        }
    }
}

/// Process-lifetime running statistics
///
/// Single owner, single writer. Wrap it in nothing: the receiver stage owns it
/// outright and passes out [`Snapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    current: Snapshot,
    saturated: bool,
}

impl AggregateState {
    /// Fresh state with sentinel bounds and zero count
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one reading into the statistics and return the result
    pub fn record(&mut self, reading: i32) -> Snapshot {
        let s = &mut self.current;

        s.count = s.count.saturating_add(1);
        s.total = match s.total.checked_add(i64::from(reading)) {
            Some(total) => total,
            None => {
                if !self.saturated {
                    self.saturated = true;
                    log::warn!("aggregate total saturated after {} readings", s.count);
                }
                s.total.saturating_add(i64::from(reading))
            }
        };

        if reading < s.minimum {
            s.minimum = reading;
        } else if reading > s.maximum {
            s.maximum = reading;
        }

        *s
    }

    /// Current statistics
    pub fn snapshot(&self) -> Snapshot {
        self.current
    }
}
