//! Network Endpoints
//!
//! CoAP defaults: the node listens on the standard CoAP port and forwards
//! reports to a proxy collector on a neighbouring port.

/// Address the receiver stage binds to (standard CoAP port, RFC 7252 §12.6).
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5683";

/// Collector (proxy) receiving anomaly reports.
pub const DEFAULT_COLLECTOR_ADDR: &str = "10.0.0.139:5688";

/// Resource path reports are POSTed to.
pub const DEFAULT_URI_PATH: &str = "/data";

/// Identifier written into every report's `id` field.
pub const DEFAULT_NODE_ID: &str = "123";
