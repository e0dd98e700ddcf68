//! Syncable record and local state model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChangeOperation, PendingChange};

/// A syncable entity with optional server-assigned version tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Record identifier, unique within a profile
    pub id: String,
    /// Entity payload
    #[serde(default)]
    pub data: Value,
    /// Monotonically increasing, server-assigned version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Last modification time as reported by whoever wrote the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// When this copy was last confirmed against the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    /// Soft delete flag for sync
    #[serde(default)]
    pub deleted: bool,
}

impl SyncRecord {
    /// Create an unversioned local record
    #[must_use]
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
            version: None,
            updated_at: Some(Utc::now()),
            synced_at: None,
            deleted: false,
        }
    }

    #[must_use]
    pub const fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    #[must_use]
    pub const fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    #[must_use]
    pub const fn with_synced_at(mut self, synced_at: DateTime<Utc>) -> Self {
        self.synced_at = Some(synced_at);
        self
    }
}

/// Full exported state of a profile.
///
/// Used as the payload handed to `sync_data`, as restore point snapshots and
/// as before/after capture in audit entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default, alias = "transactions")]
    pub records: Vec<SyncRecord>,
}

impl LocalState {
    #[must_use]
    pub const fn new(records: Vec<SyncRecord>) -> Self {
        Self { records }
    }

    /// Look up a record by id
    pub fn get(&self, record_id: &str) -> Option<&SyncRecord> {
        self.records.iter().find(|record| record.id == record_id)
    }

    /// Insert or replace a record, keeping the original position on replace
    pub fn upsert(&mut self, record: SyncRecord) {
        match self.records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Remove a record, returning it if present
    pub fn remove(&mut self, record_id: &str) -> Option<SyncRecord> {
        let index = self.records.iter().position(|record| record.id == record_id)?;
        Some(self.records.remove(index))
    }

    /// Apply a local mutation ahead of sync.
    ///
    /// Version and `synced_at` are kept so the record can still be checked
    /// against the remote copy. Deletes are soft until the remote confirms.
    pub fn apply_change(&mut self, change: &PendingChange) {
        let existing = self.get(&change.record_id).cloned();
        let mut record = existing.unwrap_or_else(|| SyncRecord::new(change.record_id.clone(), Value::Null));
        record.updated_at = Some(change.enqueued_at);
        match change.operation {
            ChangeOperation::Create | ChangeOperation::Update => {
                record.data = change.payload.clone();
                record.deleted = false;
            }
            ChangeOperation::Delete => record.deleted = true,
        }
        self.upsert(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
