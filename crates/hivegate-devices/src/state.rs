//! Read-time state derivations.

use hivegate_core::config::limits::OFFLINE_AFTER;
use hivegate_core::state::ConnectivityStatus;

/// Connectivity staleness rule: a device with no message inside the
/// offline window reads as OFFLINE. Derived by readers; the reconciler
/// never polls for or writes this proactively.
pub fn connection_status(last_seen_at: i64, now: i64) -> ConnectivityStatus {
    if now.saturating_sub(last_seen_at) > OFFLINE_AFTER.as_secs() as i64 {
        ConnectivityStatus::Offline
    } else {
        ConnectivityStatus::Online
    }
}
