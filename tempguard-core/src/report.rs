//! Anomaly reports and their outbound payload
//!
//! An [`AnomalyReport`] is what a slot carries from the receiver to the sender:
//! the offending reading plus the aggregate statistics at the moment it was
//! seen. The sender renders it into a [`ReportPayload`], a small JSON object
//! the collector understands:
//!
//! ```text
//! {"id":"123","type":"warning","temp":"58","temp_min":"58","temp_max":"68","temp_avg":"63"}
//! ```
//!
//! Numbers travel as JSON strings, as the node firmware sends them.

use core::fmt::Display;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::aggregate::Snapshot;
use crate::constants::{MAX_INLINE_ID, MAX_PAYLOAD_SIZE};
use crate::errors::{ConfigError, EncodeError};

/// `type` field of every report
pub const REPORT_KIND: &str = "warning";

/// Inline node identifier, no heap allocation
pub type NodeId = heapless::String<MAX_INLINE_ID>;

/// Build a [`NodeId`], rejecting ids that do not fit inline
pub fn node_id(id: &str) -> Result<NodeId, ConfigError> {
    let mut out = NodeId::new();
    out.push_str(id).map_err(|_| ConfigError::IdTooLong {
        id: id.to_string(),
        max: MAX_INLINE_ID,
    })?;
    Ok(out)
}

/// Snapshot of one anomalous reading and the statistics around it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AnomalyReport {
    /// The anomalous reading
    pub reading: i32,
    /// Lowest reading at detection time
    pub minimum: i32,
    /// Highest reading at detection time
    pub maximum: i32,
    /// Readings observed at detection time
    pub count: u64,
    /// Sum of readings at detection time
    pub total: i64,
}

impl AnomalyReport {
    /// Combine a reading with the snapshot `record` returned for it
    pub fn new(reading: i32, snapshot: Snapshot) -> Self {
        Self {
            reading,
            minimum: snapshot.minimum,
            maximum: snapshot.maximum,
            count: snapshot.count,
            total: snapshot.total,
        }
    }

    /// Mean reading at detection time
    ///
    /// A report with `count == 0` cannot come out of the receiver, but a
    /// zeroed slot can; it averages to the reading itself.
    pub fn average(&self) -> i64 {
        let snapshot = Snapshot {
            minimum: self.minimum,
            maximum: self.maximum,
            count: self.count,
            total: self.total,
        };
        snapshot.average().unwrap_or(i64::from(self.reading))
    }

    /// Payload view of this report
    pub fn payload<'a>(&self, id: &'a str) -> ReportPayload<'a> {
        ReportPayload {
            id,
            kind: REPORT_KIND,
            temp: self.reading,
            temp_min: self.minimum,
            temp_max: self.maximum,
            temp_avg: self.average(),
        }
    }
}

/// Wire shape of an outbound report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload<'a> {
    /// Reporting node
    pub id: &'a str,
    /// Always [`REPORT_KIND`]
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// Anomalous reading
    #[serde(with = "as_string")]
    pub temp: i32,
    /// Lowest reading so far
    #[serde(with = "as_string")]
    pub temp_min: i32,
    /// Highest reading so far
    #[serde(with = "as_string")]
    pub temp_max: i32,
    /// Mean reading so far
    #[serde(with = "as_string")]
    pub temp_avg: i64,
}

impl ReportPayload<'_> {
    /// Render as JSON, enforcing [`MAX_PAYLOAD_SIZE`]
    pub fn to_json(&self) -> Result<Vec<u8>, EncodeError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| EncodeError::Serialize(e.to_string()))?;
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(EncodeError::PayloadTooLarge {
                size: bytes.len(),
                limit: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(bytes)
    }
}

/// Numbers as JSON strings
mod as_string {
    use super::*;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateState;

    #[test]
    fn renders_collector_format() {
        let mut state = AggregateState::new();
        state.record(65);
        state.record(68);
        let report = AnomalyReport::new(58, state.record(58));

        let json = report.payload("123").to_json().unwrap();
        assert_eq!(
            std::str::from_utf8(&json).unwrap(),
            r#"{"id":"123","type":"warning","temp":"58","temp_min":"58","temp_max":"68","temp_avg":"63"}"#
        );
    }

    #[test]
    fn zero_count_averages_to_reading() {
        let report = AnomalyReport {
            reading: 80,
            ..AnomalyReport::default()
        };
        assert_eq!(report.average(), 80);
        assert_eq!(report.payload("n").temp_avg, 80);
    }

    #[test]
    fn payload_parses_back() {
        let report = AnomalyReport {
            reading: 75,
            minimum: 61,
            maximum: 75,
            count: 4,
            total: 270,
        };
        let json = report.payload("node-7").to_json().unwrap();
        let parsed: ReportPayload<'_> = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, report.payload("node-7"));
        assert_eq!(parsed.temp_avg, 67);
    }

    #[test]
    fn node_id_limit() {
        assert!(node_id("sensor-01").is_ok());
        let err = node_id("a-very-long-node-identifier").unwrap_err();
        assert!(matches!(err, ConfigError::IdTooLong { max: MAX_INLINE_ID, .. }));
    }
}
