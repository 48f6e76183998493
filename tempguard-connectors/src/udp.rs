//! UDP transport over a tokio socket
//!
//! One [`UdpTransport`] wraps one bound socket. The node binds two: the
//! listening socket for sensor traffic and an ephemeral one for reports, so
//! replies from the collector never land in the receiver stage.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::net::UdpSocket;

use tempguard_core::{Transport, TransportError};

use crate::{ConnectionStats, ConnectorError};

/// Bound UDP socket implementing [`Transport`]
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    stats: SocketCounters,
}

#[derive(Debug, Default)]
struct SocketCounters {
    datagrams_received: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
    bytes_sent: AtomicU64,
}

impl UdpTransport {
    /// Bind a socket on `addr`
    pub async fn bind(addr: SocketAddr) -> Result<Self, ConnectorError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ConnectorError::Bind { addr, source })?;
        log::debug!("bound UDP socket on {}", addr);
        Ok(Self::from_socket(socket))
    }

    /// Wrap an already bound socket
    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            stats: SocketCounters::default(),
        }
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, ConnectorError> {
        self.socket.local_addr().map_err(ConnectorError::Io)
    }

    /// Traffic counters for this socket
    pub fn stats(&self) -> ConnectionStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ConnectionStats {
            datagrams_received: load(&self.stats.datagrams_received),
            bytes_received: load(&self.stats.bytes_received),
            messages_sent: load(&self.stats.messages_sent),
            messages_failed: load(&self.stats.messages_failed),
            bytes_sent: load(&self.stats.bytes_sent),
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn receive(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        let (len, source) = self.socket.recv_from(buf).await?;
        self.stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
        Ok((len, source))
    }

    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> Result<usize, TransportError> {
        match self.socket.send_to(bytes, dest).await {
            Ok(sent) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
                Ok(sent)
            }
            Err(e) => {
                self.stats.messages_failed.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }
}
