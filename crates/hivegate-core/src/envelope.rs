//! Typed message envelopes.
//!
//! Devices publish JSON payloads on `devices/{device_id}/{category}`
//! topics. A payload is either a single reading (`Envelope`) or, for
//! telemetry, a packet of readings (`BatchEnvelope`) sent to reduce
//! per-message overhead.

use serde::{Deserialize, Serialize};

use crate::storage::JsonMap;

/// Message category carried in the topic's third segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    Telemetry,
    Alerts,
}

impl MessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Alerts => "alerts",
        }
    }

    /// Parse a topic segment. Returns `None` for unsupported categories.
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "telemetry" => Some(Self::Telemetry),
            "alerts" => Some(Self::Alerts),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-reading message payload.
///
/// Fields default to their zero values on decode; the validator is
/// responsible for rejecting empty/zero fields afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub payload: JsonMap,
}

/// A single reading inside a batch packet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub payload: JsonMap,
}

/// A batch of telemetry readings from one device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchEnvelope {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub readings: Vec<Reading>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_decodes_with_type_alias() {
        let env: Envelope = serde_json::from_value(json!({
            "device_id": "dev-1",
            "timestamp": 1700000000,
            "type": "temp-sensor",
            "payload": {"temp": 21.5},
        }))
        .unwrap();
        assert_eq!(env.device_type, "temp-sensor");
        assert_eq!(env.payload.get("temp").unwrap().as_f64(), Some(21.5));
    }

    #[test]
    fn missing_fields_decode_to_zero_values() {
        let env: Envelope = serde_json::from_value(json!({"device_id": "dev-1"})).unwrap();
        assert_eq!(env.timestamp, 0);
        assert!(env.device_type.is_empty());
        assert!(env.payload.is_empty());
    }

    #[test]
    fn batch_envelope_decodes_readings() {
        let env: BatchEnvelope = serde_json::from_value(json!({
            "device_id": "dev-1",
            "type": "temp-sensor",
            "readings": [
                {"timestamp": 100, "payload": {"temp": 20.0}},
                {"timestamp": 101, "payload": {"temp": 21.0}},
            ],
        }))
        .unwrap();
        assert_eq!(env.readings.len(), 2);
        assert_eq!(env.readings[1].timestamp, 101);
    }

    #[test]
    fn category_parses_only_known_segments() {
        assert_eq!(
            MessageCategory::parse("telemetry"),
            Some(MessageCategory::Telemetry)
        );
        assert_eq!(MessageCategory::parse("alerts"), Some(MessageCategory::Alerts));
        assert_eq!(MessageCategory::parse("commands"), None);
        assert_eq!(MessageCategory::parse(""), None);
    }
}
