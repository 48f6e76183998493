//! TempGuard sensor node
//!
//! Listens for CoAP temperature readings, keeps running statistics and
//! forwards a JSON anomaly report to the collector for every reading outside
//! the normal range.

pub mod config;
pub mod node;

pub use config::NodeConfig;
pub use node::Node;
