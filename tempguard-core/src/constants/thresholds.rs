//! Normal Operating Range
//!
//! Readings arrive as integers in the sensor's native unit. Anything strictly
//! outside `[DEFAULT_LOW_BOUND, DEFAULT_HIGH_BOUND]` is reported as an anomaly;
//! the bounds themselves are normal.

/// Lowest reading still considered normal.
///
/// Matches the deployment this node was built for (a climate-controlled
/// enclosure held between 60 and 70 degrees).
pub const DEFAULT_LOW_BOUND: i32 = 60;

/// Highest reading still considered normal.
pub const DEFAULT_HIGH_BOUND: i32 = 70;
