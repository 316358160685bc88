//! Batch telemetry helpers.
//!
//! Batch packets carry a `readings` array instead of a single `payload`
//! object; detection runs before any heavy validation so the validator
//! can pick the right decode path. The strict per-reading pass lives here
//! too: it rejects the whole batch on the first bad reading with an
//! index-annotated error.

use serde_json::Value;

use hivegate_core::config::limits::MAX_FUTURE_SKEW_SECS;
use hivegate_core::envelope::Reading;
use hivegate_core::error::{Error, Result};
use hivegate_core::state::UNKNOWN_STATE;
use hivegate_devices::DeviceRule;

/// Whether the raw payload value is a batch packet.
pub fn is_batch_payload(payload: &Value) -> bool {
    payload
        .get("readings")
        .map(Value::is_array)
        .unwrap_or(false)
}

/// Strict pre-validation: every reading must carry a timestamp within the
/// skew tolerance, a non-empty payload, and fields the device type's rule
/// can extract a state from.
pub fn validate_readings(rule: &dyn DeviceRule, readings: &[Reading], now: i64) -> Result<()> {
    for (i, reading) in readings.iter().enumerate() {
        if reading.timestamp <= 0 {
            return Err(Error::InvalidPayload(format!(
                "reading[{i}] missing timestamp"
            )));
        }

        if reading.timestamp > now + MAX_FUTURE_SKEW_SECS {
            return Err(Error::InvalidPayload(format!(
                "reading[{i}] timestamp in the future"
            )));
        }

        if reading.payload.is_empty() {
            return Err(Error::InvalidPayload(format!("reading[{i}] empty payload")));
        }

        if rule.extract_operational(&reading.payload) == UNKNOWN_STATE {
            return Err(Error::InvalidPayload(format!(
                "reading[{i}] payload does not match device type"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivegate_core::storage::JsonMap;
    use hivegate_devices::RuleTable;
    use serde_json::json;

    fn temp_reading(ts: i64, temp: f64) -> Reading {
        let mut payload = JsonMap::new();
        payload.insert("temp".into(), json!(temp));
        Reading {
            timestamp: ts,
            payload,
        }
    }

    fn temp_rule() -> std::sync::Arc<dyn DeviceRule> {
        RuleTable::with_builtin()
            .get("temp-sensor")
            .cloned()
            .unwrap()
    }

    #[test]
    fn detects_batch_payloads() {
        assert!(is_batch_payload(&json!({"readings": []})));
        assert!(is_batch_payload(&json!({"readings": [{"timestamp": 1}]})));
        assert!(!is_batch_payload(&json!({"readings": "not-a-list"})));
        assert!(!is_batch_payload(&json!({"payload": {"temp": 20}})));
        assert!(!is_batch_payload(&json!(42)));
    }

    #[test]
    fn accepts_well_formed_readings() {
        let rule = temp_rule();
        let now = 1_700_000_000;
        let readings = vec![temp_reading(now - 10, 20.0), temp_reading(now, 25.0)];
        assert!(validate_readings(rule.as_ref(), &readings, now).is_ok());
    }

    #[test]
    fn annotates_the_offending_index() {
        let rule = temp_rule();
        let now = 1_700_000_000;

        let readings = vec![temp_reading(now, 20.0), temp_reading(0, 25.0)];
        let err = validate_readings(rule.as_ref(), &readings, now).unwrap_err();
        assert!(err.to_string().contains("reading[1]"), "{err}");

        let mut bad_payload = temp_reading(now, 20.0);
        bad_payload.payload.clear();
        bad_payload
            .payload
            .insert("temp".into(), json!("not-a-number"));
        let readings = vec![bad_payload, temp_reading(now, 25.0)];
        let err = validate_readings(rule.as_ref(), &readings, now).unwrap_err();
        assert!(err.to_string().contains("reading[0]"), "{err}");
    }

    #[test]
    fn rejects_future_readings_beyond_skew() {
        let rule = temp_rule();
        let now = 1_700_000_000;

        let ok = vec![temp_reading(now + MAX_FUTURE_SKEW_SECS, 20.0)];
        assert!(validate_readings(rule.as_ref(), &ok, now).is_ok());

        let bad = vec![temp_reading(now + MAX_FUTURE_SKEW_SECS + 1, 20.0)];
        assert!(validate_readings(rule.as_ref(), &bad, now).is_err());
    }
}
