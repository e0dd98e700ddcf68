//! Shared sync state types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync session state. Exactly one value is active per coordinator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Error,
    Offline,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a coordinator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub sync_state: SyncState,
    pub pending_changes: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub auto_sync_trigger: u64,
    pub should_auto_sync: bool,
    pub is_online: bool,
}

impl SyncStatus {
    /// State for display: an idle coordinator without connectivity shows as offline
    pub const fn display_state(&self) -> SyncState {
        match self.sync_state {
            SyncState::Idle if !self.is_online => SyncState::Offline,
            state => state,
        }
    }
}
