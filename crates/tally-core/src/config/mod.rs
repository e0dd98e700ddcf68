//! Sync engine configuration.
//!
//! Storage namespaces, the auto-sync debounce window and the thresholds that
//! decide when a restore point is captured automatically.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::scoped_key;

/// Default quiet period before a queued change triggers auto-sync
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);
/// Default upper bound for a single remote round trip
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);
/// Pending batches at least this large get a restore point before flushing
pub const DEFAULT_BULK_RESTORE_THRESHOLD: usize = 10;

/// Configuration shared by the audit store, restore point manager and coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub audit_namespace: String,
    pub restore_namespace: String,
    pub queue_namespace: String,
    pub state_namespace: String,
    /// Auto-sync debounce window
    #[serde(with = "duration_millis")]
    pub debounce: Duration,
    /// Timeout applied to each remote call
    #[serde(with = "duration_millis")]
    pub remote_timeout: Duration,
    /// `None` disables automatic restore points
    pub bulk_restore_threshold: Option<usize>,
    /// Keep at most this many audit entries per profile; `None` keeps all
    pub max_audit_entries: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            audit_namespace: "tally-audit".to_string(),
            restore_namespace: "tally-restore-points".to_string(),
            queue_namespace: "tally-pending".to_string(),
            state_namespace: "tally-state".to_string(),
            debounce: DEFAULT_DEBOUNCE,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            bulk_restore_threshold: Some(DEFAULT_BULK_RESTORE_THRESHOLD),
            max_audit_entries: None,
        }
    }
}

impl SyncConfig {
    /// Set the auto-sync debounce window
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the remote call timeout
    #[must_use]
    pub const fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Set the pending-change count that triggers an automatic restore point
    #[must_use]
    pub const fn with_bulk_restore_threshold(mut self, threshold: usize) -> Self {
        self.bulk_restore_threshold = Some(threshold);
        self
    }

    /// Never capture restore points automatically
    #[must_use]
    pub const fn without_auto_restore_points(mut self) -> Self {
        self.bulk_restore_threshold = None;
        self
    }

    /// Cap the per-profile audit log
    #[must_use]
    pub const fn with_max_audit_entries(mut self, max: usize) -> Self {
        self.max_audit_entries = Some(max);
        self
    }

    pub fn audit_key(&self, profile_id: &str) -> String {
        scoped_key(&self.audit_namespace, profile_id)
    }

    pub fn restore_key(&self, profile_id: &str) -> String {
        scoped_key(&self.restore_namespace, profile_id)
    }

    pub fn queue_key(&self, profile_id: &str) -> String {
        scoped_key(&self.queue_namespace, profile_id)
    }

    pub fn state_key(&self, profile_id: &str) -> String {
        scoped_key(&self.state_namespace, profile_id)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
