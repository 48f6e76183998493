//! CoAP codec for TempGuard - Lightweight Protocol for Constrained Devices
//!
//! ## Overview
//!
//! Sensors deliver readings as CoAP messages whose payload is the reading in
//! ASCII decimal. Anomaly reports leave the node as CoAP POST requests with a
//! JSON body. This module maps between those messages and the pipeline's
//! [`InboundMessage`] / [`OutboundRequest`] using the `coap-lite` crate.
//!
//! ## Design Philosophy
//!
//! Message building is separate from transport:
//! - **Platform agnostic**: any [`Transport`](tempguard_core::Transport) carries the bytes
//! - **Stateless**: the codec holds no message ids or tokens; the sender stage owns ids
//! - **No ACK handling**: confirmable reports are sent once and never retransmitted
//!
//! ## Wire Format
//!
//! ```text
//! Outbound report
//! ┌──────────┬──────────┬─────────────────┬──────────────────────┬──────┬─────────┐
//! │ Ver/Type │ POST     │ Message ID      │ Uri-Path (per segm.) │ 0xFF │ JSON    │
//! │ 1 / CON  │ 0.02     │ from sender     │ Content-Format: 50   │      │ payload │
//! └──────────┴──────────┴─────────────────┴──────────────────────┴──────┴─────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use tempguard_connectors::coap::CoapCodec;
//! use tempguard_core::{OutboundRequest, ProtocolCodec};
//!
//! let codec = CoapCodec::new();
//! let bytes = codec.encode(&OutboundRequest {
//!     uri_path: "/data",
//!     message_id: 7,
//!     confirmable: true,
//!     payload: br#"{"id":"123"}"#,
//! })?;
//!
//! // Send bytes over your transport
//! assert_eq!(bytes[0] >> 6, 1); // Version 1
//! # Ok::<(), tempguard_core::EncodeError>(())
//! ```

use coap_lite::{
    CoapOption, MessageClass, MessageType as CoapMessageType, Packet, RequestType,
};

use tempguard_core::{DecodeError, EncodeError, InboundMessage, OutboundRequest, ProtocolCodec};

/// Re-export commonly used types
pub use coap_lite::ContentFormat;

/// CoAP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Confirmable message (requires ACK)
    Confirmable,
    /// Non-confirmable message (fire and forget)
    NonConfirmable,
    /// Acknowledgment
    Acknowledgment,
    /// Reset
    Reset,
}

impl From<MessageType> for CoapMessageType {
    fn from(mt: MessageType) -> Self {
        match mt {
            MessageType::Confirmable => CoapMessageType::Confirmable,
            MessageType::NonConfirmable => CoapMessageType::NonConfirmable,
            MessageType::Acknowledgment => CoapMessageType::Acknowledgement,
            MessageType::Reset => CoapMessageType::Reset,
        }
    }
}

/// Codec between CoAP datagrams and pipeline messages
#[derive(Debug, Clone, Default)]
pub struct CoapCodec {
    content_format: Option<ContentFormat>,
}

impl CoapCodec {
    /// Codec tagging outbound reports as `application/json`
    pub fn new() -> Self {
        Self {
            content_format: Some(ContentFormat::ApplicationJSON),
        }
    }

    /// Codec that omits the Content-Format option on outbound reports
    pub fn without_content_format() -> Self {
        Self {
            content_format: None,
        }
    }
}

impl ProtocolCodec for CoapCodec {
    fn decode(&self, bytes: &[u8]) -> Result<InboundMessage, DecodeError> {
        let packet =
            Packet::from_bytes(bytes).map_err(|e| DecodeError::Malformed(format!("{:?}", e)))?;

        Ok(InboundMessage {
            message_id: packet.header.message_id,
            content_format: packet
                .get_content_format()
                .and_then(|cf| u16::try_from(usize::from(cf)).ok()),
            option_count: packet.options().count(),
            method_code: u8::from(packet.header.code),
            payload: packet.payload,
        })
    }

    fn encode(&self, request: &OutboundRequest<'_>) -> Result<Vec<u8>, EncodeError> {
        let mut packet = Packet::new();
        packet.header.set_type(
            if request.confirmable {
                MessageType::Confirmable
            } else {
                MessageType::NonConfirmable
            }
            .into(),
        );
        packet.header.code = MessageClass::Request(RequestType::Post);
        packet.header.message_id = request.message_id;

        // One Uri-Path option per segment
        for segment in request.uri_path.split('/').filter(|s| !s.is_empty()) {
            packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
        }
        if let Some(format) = &self.content_format {
            packet.set_content_format(format.clone());
        }
        packet.payload = request.payload.to_vec();

        packet
            .to_bytes()
            .map_err(|e| EncodeError::Build(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading_message(payload: &[u8]) -> Vec<u8> {
        let mut packet = Packet::new();
        packet.header.set_type(CoapMessageType::Confirmable);
        packet.header.code = MessageClass::Request(RequestType::Post);
        packet.header.message_id = 42;
        packet.add_option(CoapOption::UriPath, b"temp".to_vec());
        packet.payload = payload.to_vec();
        packet.to_bytes().unwrap()
    }

    fn report_request(confirmable: bool) -> OutboundRequest<'static> {
        OutboundRequest {
            uri_path: "/data",
            message_id: 7,
            confirmable,
            payload: br#"{"id":"123","type":"warning"}"#,
        }
    }

    #[test]
    fn test_decode_reading() {
        let codec = CoapCodec::new();
        let message = codec.decode(&reading_message(b"65")).unwrap();

        assert_eq!(message.message_id, 42);
        assert_eq!(message.method_code, 0x02); // POST
        assert_eq!(message.option_count, 1);
        assert_eq!(message.content_format, None);
        assert_eq!(message.reading(), Ok(65));
    }

    #[test]
    fn test_decode_garbage() {
        let codec = CoapCodec::new();
        assert!(matches!(codec.decode(&[0x01]), Err(DecodeError::Malformed(_))));
        assert!(matches!(codec.decode(&[]), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_encode_report() {
        let codec = CoapCodec::new();
        let bytes = codec.encode(&report_request(true)).unwrap();

        assert_eq!(bytes[0] >> 6, 0x1); // Version 1
        assert_eq!((bytes[0] >> 4) & 0x3, 0); // Type = CON
        assert_eq!(bytes[1], 0x02); // POST
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 7);

        let packet = Packet::from_bytes(&bytes).unwrap();
        let path: Vec<&[u8]> = packet
            .get_option(CoapOption::UriPath)
            .unwrap()
            .iter()
            .map(|s| s.as_slice())
            .collect();
        assert_eq!(path, vec![&b"data"[..]]);
        assert_eq!(packet.get_content_format(), Some(ContentFormat::ApplicationJSON));
        assert_eq!(packet.payload, report_request(true).payload);
    }

    #[test]
    fn test_encode_non_confirmable_nested_path() {
        let codec = CoapCodec::without_content_format();
        let request = OutboundRequest {
            uri_path: "sensors/temp/",
            ..report_request(false)
        };
        let bytes = codec.encode(&request).unwrap();

        let packet = Packet::from_bytes(&bytes).unwrap();
        assert_eq!(packet.header.get_type(), CoapMessageType::NonConfirmable);
        assert_eq!(packet.get_option(CoapOption::UriPath).unwrap().len(), 2);
        assert_eq!(packet.get_content_format(), None);
    }

    #[test]
    fn test_report_decodes_as_inbound() {
        let codec = CoapCodec::new();
        let bytes = codec.encode(&report_request(true)).unwrap();
        let message = codec.decode(&bytes).unwrap();

        assert_eq!(message.message_id, 7);
        assert_eq!(message.content_format, Some(50));
        assert_eq!(message.option_count, 2);
    }

    #[test]
    fn test_content_format_is_registry_number() {
        let codec = CoapCodec::new();
        for (format, number) in [
            (ContentFormat::TextPlain, 0u16),
            (ContentFormat::ApplicationCBOR, 60),
            (ContentFormat::ApplicationSenmlJSON, 110),
        ] {
            let mut packet = Packet::from_bytes(&reading_message(b"21")).unwrap();
            packet.set_content_format(format);
            let message = codec.decode(&packet.to_bytes().unwrap()).unwrap();
            assert_eq!(message.content_format, Some(number));
        }
    }
}
