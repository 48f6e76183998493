//! Buffer Sizes and Memory Constraints
//!
//! Every in-flight anomaly report lives in one of a fixed number of slots, so
//! the values below bound the memory a node can spend on reporting no matter
//! how fast telemetry arrives.

// ===== REPORT SLOTS =====

/// Default number of preallocated report slots.
///
/// Sized for a microcontroller-class node:
/// - 16 slots × ~32 bytes/report = ~512 bytes
/// - Absorbs a burst of 16 anomalies while the sender is busy
/// - Further anomalies are dropped and counted, never queued unbounded
///
/// Source: RAM budget of the first Cortex-M deployment
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// Default hand-off channel capacity (slot handles).
///
/// Larger than the pool so the channel itself never becomes the limiting
/// resource; a full channel means the sender stage has stalled.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// ===== NETWORK BUFFER SIZES =====

/// Largest inbound datagram accepted by the receiver stage (bytes).
///
/// - 1024 bytes handles any single-reading CoAP message
/// - Fits in one network packet, no fragmentation
///
/// Source: CoAP recommendations for constrained networks (RFC 7252 §4.6)
pub const MAX_PACKET_SIZE: usize = 1024;

/// Largest rendered report payload (bytes).
///
/// Worst case is a 15 character id with every number at its widest
/// (`i32::MIN` readings, `i64::MIN` average), about 150 bytes. Anything
/// larger is rejected as an encode error rather than truncated.
pub const MAX_PAYLOAD_SIZE: usize = 192;

// ===== STRING AND IDENTIFIER LIMITS =====

/// Maximum node id length (characters).
///
/// Fits in an inline string:
/// - 15 chars + length = 16 bytes
/// - Avoids heap allocation for the id carried by every report
pub const MAX_INLINE_ID: usize = 15;
