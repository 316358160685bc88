//! Built-in device rules.
//!
//! One unit struct per shipped device type. New types are added by
//! registering another implementation, never by branching on type-name
//! strings inside shared logic.

use std::sync::Arc;

use hivegate_core::state::{Health, UNKNOWN_STATE};
use hivegate_core::storage::JsonMap;
use serde_json::Value;

use crate::rules::{DeviceRule, RuleTable};

/// Register every built-in rule.
pub(crate) fn register_builtin(table: &mut RuleTable) {
    table.register("temp-sensor", Arc::new(TempSensor));
    table.register("light-sensor", Arc::new(LightSensor));
    table.register("door-actuator", Arc::new(DoorActuator));
    table.register("door-sensor", Arc::new(DoorSensor));
}

/// Temperature sensor: `temp` in °C. Above 30 runs HOT, below 18 COLD.
pub struct TempSensor;

impl DeviceRule for TempSensor {
    fn extract_operational(&self, payload: &JsonMap) -> String {
        match payload.get("temp").and_then(Value::as_f64) {
            Some(temp) if temp > 30.0 => "HOT".to_string(),
            Some(temp) if temp < 18.0 => "COLD".to_string(),
            Some(_) => "NORMAL".to_string(),
            None => UNKNOWN_STATE.to_string(),
        }
    }

    fn evaluate_health(&self, operational: &str) -> Health {
        match operational {
            "HOT" => Health::Degraded,
            "COLD" | "NORMAL" => Health::Healthy,
            _ => Health::Degraded,
        }
    }
}

/// Ambient light sensor: `light_level` in lux.
pub struct LightSensor;

impl DeviceRule for LightSensor {
    fn extract_operational(&self, payload: &JsonMap) -> String {
        match payload.get("light_level").and_then(Value::as_f64) {
            Some(level) if level > 600.0 => "BRIGHT".to_string(),
            Some(level) if level < 200.0 => "DIM".to_string(),
            Some(_) => "NORMAL".to_string(),
            None => UNKNOWN_STATE.to_string(),
        }
    }

    fn evaluate_health(&self, operational: &str) -> Health {
        match operational {
            "BRIGHT" | "DIM" | "NORMAL" => Health::Healthy,
            _ => Health::Degraded,
        }
    }
}

/// Door lock actuator: reports `lock_state` verbatim (LOCKED/UNLOCKED).
pub struct DoorActuator;

impl DeviceRule for DoorActuator {
    fn extract_operational(&self, payload: &JsonMap) -> String {
        match payload.get("lock_state").and_then(Value::as_str) {
            Some(state) if !state.is_empty() => state.to_string(),
            _ => UNKNOWN_STATE.to_string(),
        }
    }

    fn evaluate_health(&self, operational: &str) -> Health {
        if operational == UNKNOWN_STATE {
            Health::Degraded
        } else {
            Health::Healthy
        }
    }
}

/// Door contact sensor: `open` as a bool, or as a string from firmware
/// that stringifies it ("true"/"open" and casings thereof).
pub struct DoorSensor;

impl DeviceRule for DoorSensor {
    fn extract_operational(&self, payload: &JsonMap) -> String {
        match payload.get("open") {
            Some(Value::Bool(true)) => "OPEN".to_string(),
            Some(Value::Bool(false)) => "CLOSED".to_string(),
            Some(Value::String(s)) => {
                let lower = s.to_ascii_lowercase();
                if lower == "true" || lower == "open" {
                    "OPEN".to_string()
                } else {
                    "CLOSED".to_string()
                }
            }
            _ => UNKNOWN_STATE.to_string(),
        }
    }

    fn evaluate_health(&self, operational: &str) -> Health {
        if operational == UNKNOWN_STATE {
            Health::Degraded
        } else {
            Health::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(key: &str, value: Value) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn temp_sensor_thresholds() {
        let rule = TempSensor;
        assert_eq!(rule.extract_operational(&payload("temp", json!(35))), "HOT");
        assert_eq!(rule.extract_operational(&payload("temp", json!(10.5))), "COLD");
        assert_eq!(rule.extract_operational(&payload("temp", json!(21))), "NORMAL");
        assert_eq!(rule.extract_operational(&payload("temp", json!(30))), "NORMAL");
    }

    #[test]
    fn temp_sensor_rejects_non_numeric_payload() {
        let rule = TempSensor;
        assert_eq!(
            rule.extract_operational(&payload("temp", json!("hot"))),
            UNKNOWN_STATE
        );
        assert_eq!(rule.extract_operational(&JsonMap::new()), UNKNOWN_STATE);
    }

    #[test]
    fn temp_sensor_health() {
        let rule = TempSensor;
        assert_eq!(rule.evaluate_health("HOT"), Health::Degraded);
        assert_eq!(rule.evaluate_health("COLD"), Health::Healthy);
        assert_eq!(rule.evaluate_health("NORMAL"), Health::Healthy);
        // fail-safe for anything unrecognized
        assert_eq!(rule.evaluate_health("MELTING"), Health::Degraded);
        assert_eq!(rule.evaluate_health(UNKNOWN_STATE), Health::Degraded);
    }

    #[test]
    fn light_sensor_thresholds() {
        let rule = LightSensor;
        assert_eq!(
            rule.extract_operational(&payload("light_level", json!(700))),
            "BRIGHT"
        );
        assert_eq!(
            rule.extract_operational(&payload("light_level", json!(100))),
            "DIM"
        );
        assert_eq!(
            rule.extract_operational(&payload("light_level", json!(400))),
            "NORMAL"
        );
        assert_eq!(rule.extract_operational(&JsonMap::new()), UNKNOWN_STATE);
    }

    #[test]
    fn door_actuator_passes_lock_state_through() {
        let rule = DoorActuator;
        assert_eq!(
            rule.extract_operational(&payload("lock_state", json!("LOCKED"))),
            "LOCKED"
        );
        assert_eq!(
            rule.extract_operational(&payload("lock_state", json!("UNLOCKED"))),
            "UNLOCKED"
        );
        assert_eq!(
            rule.extract_operational(&payload("lock_state", json!(1))),
            UNKNOWN_STATE
        );
        assert_eq!(rule.evaluate_health("LOCKED"), Health::Healthy);
        assert_eq!(rule.evaluate_health(UNKNOWN_STATE), Health::Degraded);
    }

    #[test]
    fn door_sensor_accepts_bool_and_string_forms() {
        let rule = DoorSensor;
        assert_eq!(rule.extract_operational(&payload("open", json!(true))), "OPEN");
        assert_eq!(
            rule.extract_operational(&payload("open", json!(false))),
            "CLOSED"
        );
        assert_eq!(
            rule.extract_operational(&payload("open", json!("TRUE"))),
            "OPEN"
        );
        assert_eq!(
            rule.extract_operational(&payload("open", json!("Open"))),
            "OPEN"
        );
        assert_eq!(
            rule.extract_operational(&payload("open", json!("shut"))),
            "CLOSED"
        );
        assert_eq!(rule.extract_operational(&JsonMap::new()), UNKNOWN_STATE);
    }
}
