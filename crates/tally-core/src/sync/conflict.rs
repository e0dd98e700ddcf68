//! Conflict detection between a local candidate and the current remote copy.
//!
//! Versions are server-assigned and monotonic, so when both sides carry one
//! they alone decide staleness. Timestamps are only consulted when a version
//! is missing, since clock skew between devices makes them unreliable.

use chrono::{DateTime, Utc};

use crate::models::SyncRecord;

/// Decide whether the remote copy moved on since the local copy was based on it.
///
/// - both versions present: conflict iff `remote_version > local_version`
/// - otherwise: conflict iff both timestamps are present and
///   `remote_updated_at > local_synced_at`
/// - otherwise: no conflict (not enough information to judge)
pub fn should_create_conflict(
    remote_version: Option<u64>,
    local_version: Option<u64>,
    remote_updated_at: Option<DateTime<Utc>>,
    local_synced_at: Option<DateTime<Utc>>,
) -> bool {
    match (remote_version, local_version) {
        (Some(remote), Some(local)) => remote > local,
        _ => match (remote_updated_at, local_synced_at) {
            (Some(remote), Some(local)) => remote > local,
            _ => false,
        },
    }
}

/// Apply [`should_create_conflict`] to a pair of records
pub fn records_conflict(local: &SyncRecord, remote: &SyncRecord) -> bool {
    should_create_conflict(
        remote.version,
        local.version,
        remote.updated_at,
        local.synced_at,
    )
}
