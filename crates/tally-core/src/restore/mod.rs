//! Restore points: named full-state snapshots a profile can roll back to.

use std::sync::Arc;

use serde_json::Value;

use crate::audit::AuditStore;
use crate::config::SyncConfig;
use crate::db::{
    load_json, lock_writer, save_json, KeyValueStore, LocalStateRepository, ProfileLocks,
};
use crate::error::{Error, Result};
use crate::models::{
    AuditAction, ChangeOperation, LocalState, PendingChange, RestorePoint, RestorePointId,
    TransactionChange,
};

/// Creates, lists and applies restore points
pub struct RestorePointManager {
    store: Arc<dyn KeyValueStore>,
    config: SyncConfig,
    states: LocalStateRepository,
    audit: Arc<AuditStore>,
    writers: ProfileLocks,
}

/// State written by a restore and the changes that reproduce it remotely
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RestoredState {
    pub state: LocalState,
    pub changes: Vec<PendingChange>,
}

impl RestorePointManager {
    pub fn new(store: Arc<dyn KeyValueStore>, config: SyncConfig, audit: Arc<AuditStore>) -> Self {
        let states = LocalStateRepository::new(store.clone(), config.clone());
        Self {
            store,
            config,
            states,
            audit,
            writers: ProfileLocks::new(),
        }
    }

    /// Persist a new restore point. Current state is not touched.
    pub fn create_restore_point(
        &self,
        profile_id: &str,
        label: impl Into<String>,
        snapshot: LocalState,
    ) -> Result<RestorePoint> {
        let point = RestorePoint::new(label, snapshot);

        let writer = self.writers.for_profile(profile_id);
        let guard = lock_writer(&writer);
        let mut points = self.load(profile_id)?;
        points.push(point.clone());
        save_json(
            self.store.as_ref(),
            &self.config.restore_key(profile_id),
            &points,
        )?;
        drop(guard);

        tracing::info!(
            profile = %profile_id,
            restore_point = %point.id,
            records = point.snapshot.len(),
            "Created restore point '{}'",
            point.label
        );
        Ok(point)
    }

    /// Restore points for a profile, newest first
    pub fn get_restore_points(&self, profile_id: &str) -> Result<Vec<RestorePoint>> {
        let mut points = self.load(profile_id)?;
        points.reverse();
        // stable: equal timestamps keep newest-inserted first
        points.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(points)
    }

    /// Look up a single restore point
    pub fn get_restore_point(&self, profile_id: &str, id: RestorePointId) -> Result<RestorePoint> {
        self.load(profile_id)?
            .into_iter()
            .find(|point| point.id == id)
            .ok_or_else(|| Error::NotFound(format!("restore point {id}")))
    }

    /// Delete a restore point
    pub fn delete_restore_point(&self, profile_id: &str, id: RestorePointId) -> Result<()> {
        let writer = self.writers.for_profile(profile_id);
        let guard = lock_writer(&writer);
        let mut points = self.load(profile_id)?;
        let before = points.len();
        points.retain(|point| point.id != id);

        if points.len() == before {
            return Err(Error::NotFound(format!("restore point {id}")));
        }

        save_json(
            self.store.as_ref(),
            &self.config.restore_key(profile_id),
            &points,
        )?;
        drop(guard);
        tracing::info!(profile = %profile_id, restore_point = %id, "Deleted restore point");
        Ok(())
    }

    /// Replace the profile's current state with the restore point's snapshot.
    ///
    /// Restored records carry the version and `synced_at` of the copy they
    /// replace, so pushing them is an ordinary edit on top of what the remote
    /// last confirmed. Appends one `restore` audit entry capturing the state
    /// immediately before and after. Fails with `NotFound` when `id` is not
    /// one of this profile's restore points.
    ///
    /// Callers go through `SyncCoordinator::restore_from`, which queues the
    /// returned changes under the profile's writer lock.
    pub(crate) fn restore_from(
        &self,
        profile_id: &str,
        id: RestorePointId,
        changed_by: &str,
    ) -> Result<RestoredState> {
        let point = self.get_restore_point(profile_id, id)?;
        let previous = self.states.load(profile_id)?;
        let restored = rebase_snapshot(&point.snapshot, &previous);

        self.states.save(profile_id, &restored)?;

        self.audit.log_transaction_change(
            TransactionChange::new(profile_id, id.to_string(), AuditAction::Restore, changed_by)
                .with_previous_state(Some(serde_json::to_value(&previous)?))
                .with_new_state(Some(serde_json::to_value(&restored)?)),
        );

        let changes = restore_changes(&previous, &restored);
        tracing::info!(
            profile = %profile_id,
            restore_point = %id,
            changes = changes.len(),
            "Restored state from '{}'",
            point.label
        );
        Ok(RestoredState {
            state: restored,
            changes,
        })
    }

    fn load(&self, profile_id: &str) -> Result<Vec<RestorePoint>> {
        Ok(
            load_json(self.store.as_ref(), &self.config.restore_key(profile_id))?
                .unwrap_or_default(),
        )
    }
}

fn rebase_snapshot(snapshot: &LocalState, current: &LocalState) -> LocalState {
    let records = snapshot
        .records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            let base = current.get(&record.id);
            record.version = base.and_then(|existing| existing.version);
            record.synced_at = base.and_then(|existing| existing.synced_at);
            record
        })
        .collect();
    LocalState::new(records)
}

/// Pending changes that turn `current` into `target`.
///
/// Records still present in `current`, even soft-deleted ones, are updated
/// rather than recreated.
fn restore_changes(current: &LocalState, target: &LocalState) -> Vec<PendingChange> {
    let mut changes = Vec::new();

    for record in &target.records {
        let operation = match (current.get(&record.id), record.deleted) {
            (None, false) => Some(ChangeOperation::Create),
            (Some(existing), false) if existing.deleted || existing.data != record.data => {
                Some(ChangeOperation::Update)
            }
            (Some(existing), true) if !existing.deleted => Some(ChangeOperation::Delete),
            _ => None,
        };
        if let Some(operation) = operation {
            let payload = match operation {
                ChangeOperation::Delete => Value::Null,
                ChangeOperation::Create | ChangeOperation::Update => record.data.clone(),
            };
            changes.push(PendingChange::new(&record.id, operation, payload));
        }
    }

    for record in &current.records {
        if !record.deleted && target.get(&record.id).is_none() {
            changes.push(PendingChange::new(&record.id, ChangeOperation::Delete, Value::Null));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::ErrorKind;
    use crate::models::SyncRecord;
    use crate::report::CollectingReporter;
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        states: LocalStateRepository,
        audit: Arc<AuditStore>,
        manager: RestorePointManager,
    }

    fn setup() -> Fixture {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let config = SyncConfig::default();
        let audit = Arc::new(AuditStore::new(
            store.clone(),
            config.clone(),
            Arc::new(CollectingReporter::new()),
        ));
        Fixture {
            states: LocalStateRepository::new(store.clone(), config.clone()),
            manager: RestorePointManager::new(store, config, audit.clone()),
            audit,
        }
    }

    fn record(id: &str, amount: i64) -> SyncRecord {
        let epoch = DateTime::from_timestamp(0, 0).unwrap();
        SyncRecord::new(id, json!({ "amount": amount })).with_updated_at(epoch)
    }

    fn state(amount: i64) -> LocalState {
        LocalState::new(vec![record("txn-1", amount)])
    }

    #[test]
    fn create_does_not_touch_current_state() {
        let fx = setup();
        fx.states.save("p", &state(1)).unwrap();

        fx.manager.create_restore_point("p", "checkpoint", state(99)).unwrap();

        assert_eq!(fx.states.load("p").unwrap(), state(1));
    }

    #[test]
    fn restore_points_listed_newest_first() {
        let fx = setup();
        let first = fx.manager.create_restore_point("p", "first", state(1)).unwrap();
        let second = fx.manager.create_restore_point("p", "second", state(2)).unwrap();

        let points = fx.manager.get_restore_points("p").unwrap();
        let ids: Vec<_> = points.iter().map(|point| point.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn concurrent_creates_keep_every_point() {
        let fx = setup();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let manager = &fx.manager;
                scope.spawn(move || {
                    for n in 0..25 {
                        manager
                            .create_restore_point("p", format!("w{worker}-{n}"), state(n))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(fx.manager.get_restore_points("p").unwrap().len(), 100);
    }

    #[test]
    fn restore_replaces_state_and_logs_one_entry() {
        let fx = setup();
        fx.states.save("p", &state(5)).unwrap();
        let point = fx.manager.create_restore_point("p", "before import", state(1)).unwrap();
        fx.states.save("p", &state(7)).unwrap();

        let restored = fx.manager.restore_from("p", point.id, "device-1").unwrap();

        assert_eq!(restored.state, state(1));
        assert_eq!(fx.states.load("p").unwrap(), state(1));

        let logs = fx.audit.get_recent_audit_logs("p", None).unwrap();
        let restores: Vec<_> = logs
            .iter()
            .filter(|entry| entry.action == AuditAction::Restore)
            .collect();
        assert_eq!(restores.len(), 1);
        assert_eq!(restores[0].transaction_id, point.id.to_string());
        assert_eq!(restores[0].changed_by, "device-1");
        assert_eq!(
            restores[0].previous_state,
            Some(serde_json::to_value(state(7)).unwrap())
        );
        assert_eq!(
            restores[0].new_state,
            Some(serde_json::to_value(state(1)).unwrap())
        );
    }

    #[test]
    fn restore_keeps_current_sync_metadata_and_lists_changes() {
        let fx = setup();
        let snapshot = LocalState::new(vec![
            record("same", 1).with_version(1),
            record("edited", 1).with_version(1),
            record("gone-since", 3).with_version(1),
        ]);
        let point = fx.manager.create_restore_point("p", "checkpoint", snapshot).unwrap();
        let synced_at = Utc::now();
        fx.states
            .save(
                "p",
                &LocalState::new(vec![
                    record("same", 1).with_version(4).with_synced_at(synced_at),
                    record("edited", 2).with_version(5).with_synced_at(synced_at),
                    record("added-since", 9).with_version(2),
                ]),
            )
            .unwrap();

        let restored = fx.manager.restore_from("p", point.id, "device-1").unwrap();

        let edited = restored.state.get("edited").unwrap();
        assert_eq!(edited.data, json!({ "amount": 1 }));
        assert_eq!(edited.version, Some(5));
        assert_eq!(edited.synced_at, Some(synced_at));
        assert_eq!(restored.state.get("gone-since").unwrap().version, None);

        let changes: Vec<_> = restored
            .changes
            .iter()
            .map(|change| (change.record_id.as_str(), change.operation))
            .collect();
        assert_eq!(
            changes,
            vec![
                ("edited", ChangeOperation::Update),
                ("gone-since", ChangeOperation::Create),
                ("added-since", ChangeOperation::Delete),
            ]
        );
    }

    #[test]
    fn restore_from_other_profile_is_not_found() {
        let fx = setup();
        let point = fx.manager.create_restore_point("profile-a", "a", state(1)).unwrap();

        let error = fx
            .manager
            .restore_from("profile-b", point.id, "device-1")
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(fx.audit.get_recent_audit_logs("profile-b", None).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_point() {
        let fx = setup();
        let point = fx.manager.create_restore_point("p", "temp", state(1)).unwrap();

        fx.manager.delete_restore_point("p", point.id).unwrap();

        assert!(fx.manager.get_restore_points("p").unwrap().is_empty());
        assert_eq!(
            fx.manager.delete_restore_point("p", point.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
