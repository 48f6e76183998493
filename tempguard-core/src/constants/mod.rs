//! Constants for TempGuard Core
//!
//! Defaults for every externally supplied setting of a sensor node live here,
//! grouped by domain:
//! - **Thresholds**: the normal operating range for readings
//! - **Buffers**: slot pool, hand-off channel and packet sizes
//! - **Network**: ports, collector endpoint and resource path
//!
//! The node configuration falls back to these values for anything the
//! operator leaves unset.

/// Normal-range bounds used by the classifier.
pub mod thresholds;

/// Slot pool, channel and packet buffer sizes.
pub mod buffers;

/// Listening port, collector endpoint and outbound resource.
pub mod network;

pub use thresholds::{DEFAULT_HIGH_BOUND, DEFAULT_LOW_BOUND};

pub use buffers::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_POOL_CAPACITY, MAX_INLINE_ID, MAX_PACKET_SIZE,
    MAX_PAYLOAD_SIZE,
};

pub use network::{
    DEFAULT_COLLECTOR_ADDR, DEFAULT_LISTEN_ADDR, DEFAULT_NODE_ID, DEFAULT_URI_PATH,
};
