//! Node configuration
//!
//! Loaded from an optional TOML file; every field falls back to the defaults
//! in [`tempguard_core::constants`]. Command-line flags override the file.
//!
//! ```toml
//! node_id = "123"
//! listen = "0.0.0.0:5683"
//! collector = "10.0.0.139:5688"
//! uri_path = "/data"
//! low = 60
//! high = 70
//! pool_capacity = 16
//! channel_capacity = 64
//! backpressure = "block"
//! confirmable = true
//! send_timeout_ms = 500
//! stats_interval_secs = 60
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use tempguard_core::constants::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_COLLECTOR_ADDR, DEFAULT_HIGH_BOUND, DEFAULT_LISTEN_ADDR,
    DEFAULT_LOW_BOUND, DEFAULT_NODE_ID, DEFAULT_POOL_CAPACITY, DEFAULT_URI_PATH, MAX_PACKET_SIZE,
};
use tempguard_core::{
    report, BackpressurePolicy, ConfigError, NormalRange, PipelineConfig, SenderConfig,
};

/// Top-level configuration for a sensor node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Value of every report's `id` field.
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Address the sensor listener binds to.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Collector endpoint, `host:port`.
    #[serde(default = "default_collector")]
    pub collector: String,

    /// Resource path reports are POSTed to.
    #[serde(default = "default_uri_path")]
    pub uri_path: String,

    /// Lower bound of the normal range, inclusive.
    #[serde(default = "default_low")]
    pub low: i32,

    /// Upper bound of the normal range, inclusive.
    #[serde(default = "default_high")]
    pub high: i32,

    /// Report slots.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Hand-off channel capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Largest datagram accepted.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,

    /// What the receiver does when the channel is full.
    #[serde(default)]
    pub backpressure: BackpressurePolicy,

    /// Mark reports confirmable.
    #[serde(default = "default_true")]
    pub confirmable: bool,

    /// Per-send timeout in milliseconds; 0 disables it.
    #[serde(default)]
    pub send_timeout_ms: u64,

    /// Seconds between stats log lines; 0 disables them.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_node_id() -> String {
    DEFAULT_NODE_ID.to_string()
}

fn default_listen() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_collector() -> String {
    DEFAULT_COLLECTOR_ADDR.to_string()
}

fn default_uri_path() -> String {
    DEFAULT_URI_PATH.to_string()
}

fn default_low() -> i32 {
    DEFAULT_LOW_BOUND
}

fn default_high() -> i32 {
    DEFAULT_HIGH_BOUND
}

fn default_pool_capacity() -> usize {
    DEFAULT_POOL_CAPACITY
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_max_packet_size() -> usize {
    MAX_PACKET_SIZE
}

fn default_true() -> bool {
    true
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            listen: default_listen(),
            collector: default_collector(),
            uri_path: default_uri_path(),
            low: default_low(),
            high: default_high(),
            pool_capacity: default_pool_capacity(),
            channel_capacity: default_channel_capacity(),
            max_packet_size: default_max_packet_size(),
            backpressure: BackpressurePolicy::default(),
            confirmable: true,
            send_timeout_ms: 0,
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text).context("parsing TOML config")?;
        Ok(cfg)
    }

    /// Normal range, bounds swapped if given inverted.
    pub fn range(&self) -> NormalRange {
        NormalRange::new(self.low, self.high)
    }

    /// Log settings that are accepted but probably not intended.
    pub fn log_warnings(&self) {
        if self.low > self.high {
            tracing::warn!(
                low = self.low,
                high = self.high,
                "normal range bounds inverted, swapping",
            );
        }
    }

    /// Resolved listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.listen)
    }

    /// Resolved collector address.
    pub fn collector_addr(&self) -> Result<SocketAddr, ConfigError> {
        resolve(&self.collector)
    }

    /// Optional send timeout.
    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_ms > 0).then(|| Duration::from_millis(self.send_timeout_ms))
    }

    /// Optional stats logging period.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }

    /// Check everything the pipeline will need, without binding anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_pipeline_config(0).map(|_| ())
    }

    /// Build the pipeline configuration; reports start at `first_message_id`.
    pub fn to_pipeline_config(&self, first_message_id: u16) -> Result<PipelineConfig, ConfigError> {
        self.listen_addr()?;

        let config = PipelineConfig {
            range: self.range(),
            policy: self.backpressure,
            pool_capacity: self.pool_capacity,
            channel_capacity: self.channel_capacity,
            max_packet_size: self.max_packet_size,
            sender: SenderConfig {
                collector: self.collector_addr()?,
                uri_path: self.uri_path.clone(),
                node_id: report::node_id(&self.node_id)?,
                confirmable: self.confirmable,
                send_timeout: self.send_timeout(),
                first_message_id,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn resolve(addr: &str) -> Result<SocketAddr, ConfigError> {
    addr.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::InvalidAddress(addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.node_id, "123");
        assert_eq!(cfg.listen, "0.0.0.0:5683");
        assert_eq!(cfg.collector, "10.0.0.139:5688");
        assert_eq!(cfg.uri_path, "/data");
        assert_eq!((cfg.low, cfg.high), (60, 70));
        assert_eq!(cfg.pool_capacity, 16);
        assert_eq!(cfg.channel_capacity, 64);
        assert_eq!(cfg.backpressure, BackpressurePolicy::Block);
        assert!(cfg.confirmable);
        assert_eq!(cfg.send_timeout(), None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(NodeConfig::from_toml("").unwrap(), NodeConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let cfg = NodeConfig::from_toml(
            r#"
            node_id = "greenhouse-2"
            high = 85
            backpressure = "reject"
            send_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.node_id, "greenhouse-2");
        assert_eq!(cfg.low, 60);
        assert_eq!(cfg.high, 85);
        assert_eq!(cfg.backpressure, BackpressurePolicy::Reject);
        assert_eq!(cfg.send_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(NodeConfig::from_toml("colector = \"1.2.3.4:5\"").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let cfg = NodeConfig {
            pool_capacity: 0,
            ..NodeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroCapacity("pool_capacity")));

        let cfg = NodeConfig {
            node_id: "x".repeat(40),
            ..NodeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::IdTooLong { .. })));

        let cfg = NodeConfig {
            collector: "not an address".to_string(),
            ..NodeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn test_inverted_range_normalized() {
        let cfg = NodeConfig {
            low: 80,
            high: 20,
            ..NodeConfig::default()
        };
        let range = cfg.range();
        assert_eq!((range.low, range.high), (20, 80));
    }
}
