//! Common test utilities for pipeline integration tests
//!
//! This module provides:
//! - An in-memory datagram transport with a test-side peer
//! - A text codec whose message payload is the whole datagram
//! - Helpers for waiting on pipeline output with a deadline

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use tempguard_core::{
    DecodeError, EncodeError, InboundMessage, OutboundRequest, ProtocolCodec, ReportPayload,
    Transport, TransportError,
};

/// How long a test waits for one datagram before failing
pub const DEADLINE: Duration = Duration::from_secs(2);

/// In-memory transport; datagrams in come from a [`Peer`], datagrams out go to it
pub struct MemoryTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>,
}

/// Test side of a [`MemoryTransport`]
pub struct Peer {
    /// Datagrams fed to the transport's `receive`
    pub feed: mpsc::UnboundedSender<Vec<u8>>,
    /// Datagrams passed to the transport's `send_to`
    pub sent: mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>,
}

/// Connected transport and peer
pub fn memory_transport() -> (MemoryTransport, Peer) {
    let (feed, inbound) = mpsc::unbounded_channel();
    let (outbound, sent) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            inbound: Mutex::new(inbound),
            outbound,
        },
        Peer { feed, sent },
    )
}

/// Address every in-memory datagram claims to come from
pub fn sensor_addr() -> SocketAddr {
    "192.0.2.10:5683".parse().unwrap()
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok((len, sensor_addr()))
            }
            None => Err(std::io::Error::new(std::io::ErrorKind::ConnectionAborted, "feed closed").into()),
        }
    }

    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<usize, TransportError> {
        self.outbound
            .send((bytes.to_vec(), dest))
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer gone"))?;
        Ok(bytes.len())
    }
}

impl Peer {
    /// Feed one reading as decimal text
    pub fn send_reading(&self, reading: i32) {
        self.feed.send(reading.to_string().into_bytes()).unwrap();
    }

    /// Feed raw bytes
    pub fn send_raw(&self, bytes: &[u8]) {
        self.feed.send(bytes.to_vec()).unwrap();
    }

    /// Next outbound datagram, failing the test after [`DEADLINE`]
    pub async fn next_sent(&mut self) -> (Vec<u8>, SocketAddr) {
        tokio::time::timeout(DEADLINE, self.sent.recv())
            .await
            .expect("timed out waiting for a report")
            .expect("transport dropped")
    }

    /// Whether nothing more was sent
    pub fn nothing_sent(&mut self) -> bool {
        self.sent.try_recv().is_err()
    }
}

/// Message payload is the whole datagram, in both directions
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl ProtocolCodec for TextCodec {
    fn decode(&self, bytes: &[u8]) -> Result<InboundMessage, DecodeError> {
        Ok(InboundMessage {
            payload: bytes.to_vec(),
            ..InboundMessage::default()
        })
    }

    fn encode(&self, request: &OutboundRequest<'_>) -> Result<Vec<u8>, EncodeError> {
        Ok(request.payload.to_vec())
    }
}

/// Parse a datagram produced through [`TextCodec`]
pub fn parse_report(datagram: &[u8]) -> ReportPayload<'_> {
    serde_json::from_slice(datagram).expect("report payload is JSON")
}
