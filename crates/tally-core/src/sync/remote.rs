//! Remote persistence seam

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ChangeOperation, PendingChange, SyncRecord};

/// Full remote state of a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub records: Vec<SyncRecord>,
    /// Profile-level version, when the service tracks one
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteSnapshot {
    pub fn get(&self, record_id: &str) -> Option<&SyncRecord> {
        self.records.iter().find(|record| record.id == record_id)
    }
}

/// A pushed change the remote refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedChange {
    pub change_id: Uuid,
    pub record_id: String,
    pub reason: String,
}

/// Result of `push_changes`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOutcome {
    /// Ids of the changes the remote applied
    #[serde(default)]
    pub accepted: Vec<Uuid>,
    #[serde(default)]
    pub rejected: Vec<RejectedChange>,
    /// Records as stored remotely after applying the accepted changes,
    /// carrying their new server-assigned versions
    #[serde(default)]
    pub records: Vec<SyncRecord>,
}

/// Trait for remote persistence operations (async)
///
/// Implementations report transport and service failures as
/// `Error::RemoteUnavailable`.
#[allow(async_fn_in_trait)]
pub trait RemoteStore: Send + Sync {
    /// Fetch the current remote state of a profile
    async fn fetch_state(&self, profile_id: &str) -> Result<RemoteSnapshot>;

    /// Apply pending changes remotely
    async fn push_changes(&self, profile_id: &str, changes: &[PendingChange]) -> Result<PushOutcome>;
}

/// In-process remote with per-record versioning and fault injection
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    profiles: Mutex<HashMap<String, RemoteSnapshot>>,
    rejected_records: Mutex<HashSet<String>>,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
    fetch_calls: AtomicUsize,
    push_calls: AtomicUsize,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace or insert a record as if another device had written it
    pub fn put_record(&self, profile_id: &str, record: SyncRecord) {
        let mut profiles = lock(&self.profiles);
        let snapshot = profiles.entry(profile_id.to_string()).or_default();
        match snapshot.records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => snapshot.records.push(record),
        }
        snapshot.version = Some(snapshot.version.unwrap_or(0) + 1);
        snapshot.updated_at = Some(Utc::now());
    }

    pub fn snapshot(&self, profile_id: &str) -> RemoteSnapshot {
        lock(&self.profiles)
            .get(profile_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every call fail with `RemoteUnavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Reject pushed changes touching `record_id`
    pub fn reject_record(&self, record_id: impl Into<String>) {
        lock(&self.rejected_records).insert(record_id.into());
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    async fn simulate_network(&self) -> Result<()> {
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl RemoteStore for InMemoryRemote {
    async fn fetch_state(&self, profile_id: &str) -> Result<RemoteSnapshot> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        Ok(self.snapshot(profile_id))
    }

    async fn push_changes(&self, profile_id: &str, changes: &[PendingChange]) -> Result<PushOutcome> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;

        let rejected_records = lock(&self.rejected_records).clone();
        let mut profiles = lock(&self.profiles);
        let snapshot = profiles.entry(profile_id.to_string()).or_default();
        let mut outcome = PushOutcome::default();
        let now = Utc::now();

        for change in changes {
            if rejected_records.contains(&change.record_id) {
                outcome.rejected.push(RejectedChange {
                    change_id: change.id,
                    record_id: change.record_id.clone(),
                    reason: "rejected by remote".to_string(),
                });
                continue;
            }

            let position = snapshot
                .records
                .iter()
                .position(|record| record.id == change.record_id);
            let next_version = position
                .and_then(|index| snapshot.records[index].version)
                .unwrap_or(0)
                + 1;

            let record = SyncRecord {
                id: change.record_id.clone(),
                data: change.payload.clone(),
                version: Some(next_version),
                updated_at: Some(now),
                synced_at: None,
                deleted: change.operation == ChangeOperation::Delete,
            };

            match position {
                Some(index) => snapshot.records[index] = record.clone(),
                None => snapshot.records.push(record.clone()),
            }
            outcome.accepted.push(change.id);
            outcome.records.retain(|existing| existing.id != record.id);
            outcome.records.push(record);
        }

        if !outcome.accepted.is_empty() {
            snapshot.version = Some(snapshot.version.unwrap_or(0) + 1);
            snapshot.updated_at = Some(now);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn push_assigns_increasing_versions() {
        let remote = InMemoryRemote::new();
        let create = PendingChange::new("t1", ChangeOperation::Create, json!({ "amount": 1 }));
        let update = PendingChange::new("t1", ChangeOperation::Update, json!({ "amount": 2 }));

        let outcome = remote.push_changes("p", &[create.clone(), update.clone()]).await.unwrap();

        assert_eq!(outcome.accepted, vec![create.id, update.id]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].version, Some(2));
        assert_eq!(remote.snapshot("p").get("t1").unwrap().data, json!({ "amount": 2 }));
    }

    #[tokio::test]
    async fn rejected_records_are_not_applied() {
        let remote = InMemoryRemote::new();
        remote.reject_record("t2");
        let change = PendingChange::new("t2", ChangeOperation::Create, json!({}));

        let outcome = remote.push_changes("p", &[change.clone()]).await.unwrap();

        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected[0].change_id, change.id);
        assert!(remote.snapshot("p").records.is_empty());
    }

    #[tokio::test]
    async fn failing_remote_reports_unavailable() {
        let remote = InMemoryRemote::new();
        remote.set_failing(true);

        let error = remote.fetch_state("p").await.unwrap_err();
        assert!(matches!(error, Error::RemoteUnavailable(_)));
        assert_eq!(remote.fetch_calls(), 1);
    }
}
