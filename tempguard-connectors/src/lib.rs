//! Network Connectors for TempGuard Sensor Nodes
//!
//! ## Overview
//!
//! The core pipeline talks to the network through two seams,
//! [`Transport`](tempguard_core::Transport) and
//! [`ProtocolCodec`](tempguard_core::ProtocolCodec). This crate fills them in
//! for the deployment the nodes actually run in:
//!
//! - [`udp::UdpTransport`]: tokio UDP socket, one per direction
//! - [`coap::CoapCodec`]: CoAP messages in, CoAP POST requests out
//!
//! ### CoAP (Constrained Application Protocol)
//!
//! **Characteristics:**
//! - Header overhead: 4 bytes minimum
//! - Stateless (no connection overhead)
//! - Optional reliability (Confirmable messages)
//!
//! **TempGuard usage:**
//! - Reports are POSTed to a single resource on the collector
//! - Reports are marked confirmable but ACKs are never awaited or retried
//! - Message ids increase per report and wrap at `u16::MAX`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tempguard_connectors::{coap::CoapCodec, udp::UdpTransport};
//! use tempguard_core::{Pipeline, PipelineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let inbound = UdpTransport::bind("0.0.0.0:5683".parse()?).await?;
//! let outbound = UdpTransport::bind("0.0.0.0:0".parse()?).await?;
//!
//! let handle = Pipeline::new(PipelineConfig::default(), inbound, outbound, CoapCodec::new())?
//!     .spawn();
//! handle.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "coap")]
pub mod coap;

#[cfg(feature = "udp")]
pub mod udp;

// Re-export common types
#[cfg(feature = "coap")]
pub use coap::CoapCodec;
#[cfg(feature = "udp")]
pub use udp::UdpTransport;

use std::net::SocketAddr;

use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Socket could not be bound
    #[error("cannot bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Other socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Datagrams received
    pub datagrams_received: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages failed to send
    pub messages_failed: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
}
