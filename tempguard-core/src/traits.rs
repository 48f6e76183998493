//! Collaborator traits
//!
//! The pipeline never touches sockets or wire formats directly. It talks to a
//! [`Transport`] for datagrams and a [`ProtocolCodec`] for (de)serialization;
//! `tempguard-connectors` provides UDP and CoAP implementations, tests provide
//! in-memory ones.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{DecodeError, EncodeError, TransportError};

/// Datagram transport
///
/// Methods take `&self` so one socket can be shared between tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next datagram, returning its length and source
    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;

    /// Send one datagram, returning the number of bytes sent
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<usize, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        (**self).receive(buf).await
    }

    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<usize, TransportError> {
        (**self).send_to(bytes, dest).await
    }
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundMessage {
    /// Protocol message id
    pub message_id: u16,
    /// Raw method/response code
    pub method_code: u8,
    /// Content-Format option, if present
    pub content_format: Option<u16>,
    /// Message body
    pub payload: Vec<u8>,
    /// Number of options carried
    pub option_count: usize,
}

impl InboundMessage {
    /// Extract the integer reading carried in the payload
    ///
    /// The payload is ASCII decimal text; surrounding whitespace and NUL
    /// padding are ignored.
    pub fn reading(&self) -> Result<i32, DecodeError> {
        let text = std::str::from_utf8(&self.payload).map_err(|_| DecodeError::NotUtf8)?;
        let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if text.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }
        text.parse()
            .map_err(|_| DecodeError::NotAReading(text.to_string()))
    }
}

/// Outbound report request
///
/// Always a POST with a JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundRequest<'a> {
    /// Resource path on the collector, e.g. `/data`
    pub uri_path: &'a str,
    /// Protocol message id
    pub message_id: u16,
    /// Request an acknowledgement from the collector (never awaited)
    pub confirmable: bool,
    /// Rendered report
    pub payload: &'a [u8],
}

/// Wire codec
pub trait ProtocolCodec: Send + Sync {
    /// Parse one datagram
    fn decode(&self, bytes: &[u8]) -> Result<InboundMessage, DecodeError>;

    /// Build one datagram
    fn encode(&self, request: &OutboundRequest<'_>) -> Result<Vec<u8>, EncodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(payload: &[u8]) -> InboundMessage {
        InboundMessage {
            payload: payload.to_vec(),
            ..InboundMessage::default()
        }
    }

    #[test]
    fn parses_plain_and_padded_readings() {
        assert_eq!(message(b"65").reading(), Ok(65));
        assert_eq!(message(b" -12\n").reading(), Ok(-12));
        assert_eq!(message(b"58\0\0\0").reading(), Ok(58));
    }

    #[test]
    fn rejects_non_readings() {
        assert_eq!(message(b"").reading(), Err(DecodeError::EmptyPayload));
        assert_eq!(message(b"\0\0").reading(), Err(DecodeError::EmptyPayload));
        assert_eq!(message(&[0xff, 0xfe]).reading(), Err(DecodeError::NotUtf8));
        assert_eq!(
            message(b"warm").reading(),
            Err(DecodeError::NotAReading("warm".into()))
        );
        assert!(message(b"99999999999").reading().is_err());
    }
}
