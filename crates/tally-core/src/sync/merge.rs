//! Per-record reconciliation of local state, pending changes and the remote snapshot.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{AuditAction, LocalState, PendingChange, SyncConflict, SyncRecord};

use super::conflict::records_conflict;
use super::remote::{PushOutcome, RemoteSnapshot};

/// A remote record folded into local state
#[derive(Debug, Clone, PartialEq)]
pub struct PulledChange {
    pub action: AuditAction,
    pub record_id: String,
    pub previous: Option<SyncRecord>,
    pub current: Option<SyncRecord>,
}

/// Result of reconciling before the push
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Pending changes safe to push, in queue order
    pub to_push: Vec<PendingChange>,
    /// One entry per record whose remote copy moved on under a pending local edit
    pub conflicts: Vec<SyncConflict>,
    pub pulled: Vec<PulledChange>,
    pub merged: LocalState,
}

/// Reconcile `local` with `remote`.
///
/// Records with pending changes keep their local copy. Those whose remote copy
/// is newer become conflicts and all of their pending changes are held back.
/// Every other remote record is taken as-is.
pub fn reconcile(
    local: &LocalState,
    remote: &RemoteSnapshot,
    pending: &[PendingChange],
    now: DateTime<Utc>,
) -> Reconciliation {
    let pending_records: HashSet<&str> = pending
        .iter()
        .map(|change| change.record_id.as_str())
        .collect();

    let mut conflicts = Vec::new();
    let mut conflicted = HashSet::new();
    for change in pending {
        let record_id = change.record_id.as_str();
        if conflicted.contains(record_id) {
            continue;
        }
        let (Some(local_record), Some(remote_record)) = (local.get(record_id), remote.get(record_id))
        else {
            continue;
        };
        if records_conflict(local_record, remote_record) {
            conflicted.insert(record_id);
            conflicts.push(SyncConflict {
                record_id: record_id.to_string(),
                local: Some(local_record.clone()),
                remote: remote_record.clone(),
                local_version: local_record.version,
                remote_version: remote_record.version,
                detected_at: now,
            });
        }
    }

    let to_push = pending
        .iter()
        .filter(|change| !conflicted.contains(change.record_id.as_str()))
        .cloned()
        .collect();

    let mut merged = local.clone();
    let mut pulled = Vec::new();
    for remote_record in &remote.records {
        if pending_records.contains(remote_record.id.as_str()) {
            continue;
        }
        let previous = merged.get(&remote_record.id).cloned();

        if remote_record.deleted {
            if let Some(previous) = merged.remove(&remote_record.id) {
                pulled.push(PulledChange {
                    action: AuditAction::Delete,
                    record_id: remote_record.id.clone(),
                    previous: Some(previous),
                    current: None,
                });
            }
            continue;
        }

        let mut current = remote_record.clone();
        current.synced_at = Some(now);
        let action = match &previous {
            None => Some(AuditAction::Create),
            Some(previous) if differs(previous, remote_record) => Some(AuditAction::Update),
            Some(_) => None,
        };
        merged.upsert(current.clone());

        if let Some(action) = action {
            pulled.push(PulledChange {
                action,
                record_id: remote_record.id.clone(),
                previous,
                current: Some(current),
            });
        }
    }

    Reconciliation {
        to_push,
        conflicts,
        pulled,
        merged,
    }
}

/// Fold the remote's view of pushed records back into `state`
pub fn apply_push_outcome(state: &mut LocalState, outcome: &PushOutcome, now: DateTime<Utc>) {
    for record in &outcome.records {
        if record.deleted {
            state.remove(&record.id);
        } else {
            let mut record = record.clone();
            record.synced_at = Some(now);
            state.upsert(record);
        }
    }
}

fn differs(local: &SyncRecord, remote: &SyncRecord) -> bool {
    local.version != remote.version || local.data != remote.data || local.deleted != remote.deleted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeOperation;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn synced(id: &str, version: u64, data: serde_json::Value) -> SyncRecord {
        SyncRecord::new(id, data)
            .with_version(version)
            .with_synced_at(Utc::now())
    }

    fn snapshot(records: Vec<SyncRecord>) -> RemoteSnapshot {
        RemoteSnapshot {
            records,
            version: None,
            updated_at: None,
        }
    }

    #[test]
    fn stale_local_edit_becomes_conflict_and_is_held_back() {
        let local = LocalState::new(vec![synced("t1", 1, json!({ "amount": 5 }))]);
        let remote = snapshot(vec![synced("t1", 2, json!({ "amount": 7 }))]);
        let pending = vec![
            PendingChange::new("t1", ChangeOperation::Update, json!({ "amount": 6 })),
            PendingChange::new("t1", ChangeOperation::Update, json!({ "amount": 8 })),
        ];

        let result = reconcile(&local, &remote, &pending, Utc::now());

        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].local_version, Some(1));
        assert_eq!(result.conflicts[0].remote_version, Some(2));
        assert!(result.to_push.is_empty());
        assert_eq!(result.merged.get("t1").unwrap().data, json!({ "amount": 5 }));
        assert!(result.pulled.is_empty());
    }

    #[test]
    fn equal_versions_push_without_conflict() {
        let local = LocalState::new(vec![synced("t1", 3, json!({}))]);
        let remote = snapshot(vec![synced("t1", 3, json!({}))]);
        let pending = vec![PendingChange::new("t1", ChangeOperation::Update, json!({ "a": 1 }))];

        let result = reconcile(&local, &remote, &pending, Utc::now());

        assert!(result.conflicts.is_empty());
        assert_eq!(result.to_push, pending);
    }

    #[test]
    fn remote_records_without_local_edits_are_pulled() {
        let local = LocalState::new(vec![
            synced("same", 1, json!(1)),
            synced("old", 1, json!(1)),
            synced("gone", 1, json!(1)),
        ]);
        let mut gone = synced("gone", 2, json!(1));
        gone.deleted = true;
        let remote = snapshot(vec![
            synced("same", 1, json!(1)),
            synced("old", 2, json!(2)),
            gone,
            synced("new", 1, json!(3)),
        ]);

        let result = reconcile(&local, &remote, &[], Utc::now());

        let actions: Vec<_> = result
            .pulled
            .iter()
            .map(|change| (change.record_id.as_str(), change.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("old", AuditAction::Update),
                ("gone", AuditAction::Delete),
                ("new", AuditAction::Create),
            ]
        );
        assert!(result.merged.get("gone").is_none());
        assert_eq!(result.merged.get("old").unwrap().version, Some(2));
        assert!(result.merged.get("new").unwrap().synced_at.is_some());
    }

    #[test]
    fn push_outcome_updates_versions_and_drops_deleted() {
        let mut state = LocalState::new(vec![
            SyncRecord::new("t1", json!(1)),
            SyncRecord::new("t2", json!(2)),
        ]);
        let mut deleted = SyncRecord::new("t2", json!(null)).with_version(4);
        deleted.deleted = true;
        let outcome = PushOutcome {
            accepted: Vec::new(),
            rejected: Vec::new(),
            records: vec![SyncRecord::new("t1", json!(1)).with_version(1), deleted],
        };

        apply_push_outcome(&mut state, &outcome, Utc::now());

        assert_eq!(state.len(), 1);
        assert_eq!(state.get("t1").unwrap().version, Some(1));
        assert!(state.get("t1").unwrap().synced_at.is_some());
    }
}
