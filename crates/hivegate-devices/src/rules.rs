//! The device rule table.
//!
//! A registry from device-type string to an immutable rule implementation.
//! Registration happens once at process start; at request time the table
//! is read-only and safe for unsynchronized concurrent reads. Unknown
//! device types fail validation — there is no fallback rule.

use std::collections::HashMap;
use std::sync::Arc;

use hivegate_core::state::{Health, UNKNOWN_STATE};
use hivegate_core::storage::JsonMap;

/// Per-device-type semantics: extract an operational state from a raw
/// payload and classify it into a health level.
///
/// Implementations must be pure. `extract_operational` returns the literal
/// `"UNKNOWN"` when the payload lacks the fields the type requires; that is
/// the validator's sole signal of a payload/device-type mismatch.
/// `evaluate_health` must be total over every reachable state and return
/// `Health::Degraded` for anything it does not explicitly recognize.
pub trait DeviceRule: Send + Sync {
    fn extract_operational(&self, payload: &JsonMap) -> String;
    fn evaluate_health(&self, operational: &str) -> Health;
}

/// Registry of device rules keyed by device-type string.
pub struct RuleTable {
    rules: HashMap<String, Arc<dyn DeviceRule>>,
}

impl RuleTable {
    /// An empty table. Callers register rules before serving.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// A table populated with the built-in device types.
    pub fn with_builtin() -> Self {
        let mut table = Self::new();
        crate::builtin::register_builtin(&mut table);
        table
    }

    /// Register a rule for a device type. Later registrations replace
    /// earlier ones for the same type.
    pub fn register(&mut self, device_type: impl Into<String>, rule: Arc<dyn DeviceRule>) {
        self.rules.insert(device_type.into(), rule);
    }

    /// Look up the rule for a device type.
    pub fn get(&self, device_type: &str) -> Option<&Arc<dyn DeviceRule>> {
        self.rules.get(device_type)
    }

    pub fn contains(&self, device_type: &str) -> bool {
        self.rules.contains_key(device_type)
    }

    /// Registered device-type names, sorted.
    pub fn device_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Derive (operational state, health) for a payload. Falls back to
    /// (`UNKNOWN`, `DEGRADED`) when the device type is unregistered; the
    /// validator rejects such messages, but the reconciler keeps this
    /// conservative default so state writes can never invent healthiness.
    pub fn derive_state(&self, device_type: &str, payload: &JsonMap) -> (String, Health) {
        match self.rules.get(device_type) {
            Some(rule) => {
                let operational = rule.extract_operational(payload);
                let health = rule.evaluate_health(&operational);
                (operational, health)
            }
            None => (UNKNOWN_STATE.to_string(), Health::Degraded),
        }
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::with_builtin()
    }
}
