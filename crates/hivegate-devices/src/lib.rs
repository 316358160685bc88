//! Device-type knowledge and state reconciliation.
//!
//! This crate is the only place device-type-specific semantics live: the
//! rule table maps a device-type string to a pair of pure functions
//! (operational-state extraction, health evaluation), and the reconciler
//! applies event-time-ordered conditional updates to the per-device state
//! record.

pub mod builtin;
pub mod reconciler;
pub mod rules;
pub mod state;

pub use reconciler::StateReconciler;
pub use rules::{DeviceRule, RuleTable};
pub use state::connection_status;
