//! Error Types for the Reporting Pipeline
//!
//! ## Design Philosophy
//!
//! Errors are split by who can recover from them:
//!
//! 1. **Recoverable at the stage boundary**: a bad datagram, a report that
//!    cannot be encoded, an exhausted pool or a full channel. The stage logs,
//!    bumps a counter and carries on. None of these ever touch aggregate state.
//!
//! 2. **Fatal for the loop**: the transport failing underneath a stage, or the
//!    other stage having gone away. The loop returns the error so the node can
//!    surface it instead of spinning in an undefined state.
//!
//! ## Error Categories
//!
//! ### Inbound
//! - `Decode`: datagram is not a valid message, carries no integer reading or
//!   was longer than the receive buffer
//!
//! ### Outbound
//! - `Encode`: report could not be rendered or built into a message
//!
//! ### Backpressure
//! - `PoolExhausted`: every report slot is in flight
//! - `ChannelFull`: the sender stage is not keeping up
//!
//! ### Fatal
//! - `Transport`: socket-level failure
//! - `ChannelClosed`: the peer stage has terminated
//! - `Task`: a stage task panicked

use thiserror::Error;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Why an inbound datagram was discarded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Bytes are not a well-formed protocol message
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Message carries no payload
    #[error("message has an empty payload")]
    EmptyPayload,

    /// Payload is not UTF-8 text
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    /// Payload text is not an integer reading
    #[error("payload {0:?} is not an integer reading")]
    NotAReading(String),

    /// Datagram exceeded the receive buffer and may have been cut short
    #[error("datagram of at least {len} bytes exceeds limit of {limit}")]
    Oversized {
        /// Bytes received
        len: usize,
        /// Configured maximum
        limit: usize,
    },
}

/// Why an anomaly report could not be turned into an outbound message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Rendered payload does not fit the payload budget
    #[error("payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge {
        /// Rendered size in bytes
        size: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Payload serialization failed
    #[error("payload serialization failed: {0}")]
    Serialize(String),

    /// Protocol encoder rejected the message
    #[error("message build failed: {0}")]
    Build(String),
}

/// Socket-level failure
#[derive(Error, Debug)]
pub enum TransportError {
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Send did not complete in time
    #[error("send timed out after {0} ms")]
    Timeout(u64),

    /// Fewer bytes left the socket than were handed to it
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend {
        /// Bytes actually sent
        sent: usize,
        /// Bytes requested
        expected: usize,
    },
}

/// Invalid node or pipeline configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A capacity was configured as zero
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    /// Node id does not fit the inline id buffer
    #[error("node id {id:?} longer than {max} characters")]
    IdTooLong {
        /// Offending id
        id: String,
        /// Maximum length
        max: usize,
    },

    /// Address could not be parsed
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
}

/// Top-level pipeline error
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Transport failure; fatal for the affected loop
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Inbound message discarded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound report dropped
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// No free report slot
    #[error("report slot pool exhausted")]
    PoolExhausted,

    /// Hand-off channel at capacity
    #[error("hand-off channel full")]
    ChannelFull,

    /// Peer stage has terminated
    #[error("hand-off channel closed")]
    ChannelClosed,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stage task panicked or was cancelled
    #[error("stage task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EncodeError::PayloadTooLarge { size: 200, limit: 128 };
        assert_eq!(err.to_string(), "payload of 200 bytes exceeds limit of 128");

        let err = PipelineError::from(DecodeError::NotAReading("abc".into()));
        assert_eq!(err.to_string(), "decode error: payload \"abc\" is not an integer reading");

        let err = DecodeError::Oversized { len: 1025, limit: 1024 };
        assert_eq!(err.to_string(), "datagram of at least 1025 bytes exceeds limit of 1024");
    }
}
