//! Sync conflict model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SyncRecord;

/// Detected divergence between the local candidate and the remote copy.
///
/// Conflicts are surfaced to the caller; the coordinator never picks a winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// Record involved in the conflict
    pub record_id: String,
    /// Local candidate, if the record exists locally
    pub local: Option<SyncRecord>,
    /// Current remote copy
    pub remote: SyncRecord,
    pub local_version: Option<u64>,
    pub remote_version: Option<u64>,
    /// When the conflict was detected
    pub detected_at: DateTime<Utc>,
}

/// How the caller settles a reported conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Keep the local candidate and push it over the remote copy
    KeepLocal,
    /// Drop the queued local changes and adopt the remote copy
    KeepRemote,
}
