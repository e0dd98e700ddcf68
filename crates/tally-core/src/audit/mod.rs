//! Append-only, profile-scoped audit log.
//!
//! Entries live under `"<audit_namespace>-<profile_id>"`. Versions before
//! profile scoping wrote everything to the bare namespace key; the first
//! access under a profile moves that legacy log into the profile's key.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::config::SyncConfig;
use crate::db::{load_json, lock_writer, save_json, KeyValueStore, ProfileLocks};
use crate::error::Result;
use crate::models::{AuditEntry, AuditEntryId, TransactionChange};
use crate::report::ErrorReporter;

/// Profile-scoped audit log over a `KeyValueStore`
pub struct AuditStore {
    store: Arc<dyn KeyValueStore>,
    config: SyncConfig,
    reporter: Arc<dyn ErrorReporter>,
    /// Profiles whose legacy migration check already ran in this process
    checked_profiles: Mutex<HashSet<String>>,
    writers: ProfileLocks,
}

impl AuditStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: SyncConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            store,
            config,
            reporter,
            checked_profiles: Mutex::new(HashSet::new()),
            writers: ProfileLocks::new(),
        }
    }

    /// Append an immutable entry for a state change.
    ///
    /// Never fails the caller: storage errors go to the `ErrorReporter` and
    /// `None` is returned.
    pub fn log_transaction_change(&self, change: TransactionChange) -> Option<AuditEntry> {
        let entry = AuditEntry {
            id: AuditEntryId::new(),
            action: change.action,
            transaction_id: change.transaction_id,
            changed_at: Utc::now(),
            changed_by: change.changed_by,
            previous_state: change.previous_state,
            new_state: change.new_state,
        };

        match self.append(&change.profile_id, entry.clone()) {
            Ok(()) => {
                tracing::debug!(
                    profile = %change.profile_id,
                    action = %entry.action,
                    transaction = %entry.transaction_id,
                    "Audit entry recorded"
                );
                Some(entry)
            }
            Err(error) => {
                self.reporter.report("Failed to write audit entry", &error);
                None
            }
        }
    }

    /// Most recent entries for a profile, oldest first.
    ///
    /// Ordered by `changed_at` ascending with insertion order breaking ties;
    /// `limit` keeps the newest `limit` entries.
    pub fn get_recent_audit_logs(
        &self,
        profile_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEntry>> {
        let writer = self.writers.for_profile(profile_id);
        let _guard = lock_writer(&writer);
        self.migrate_scoped(profile_id)?;

        let mut entries = self.load(profile_id)?;
        // stable sort keeps insertion order for equal timestamps
        entries.sort_by_key(|entry| entry.changed_at);

        if let Some(limit) = limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }

        Ok(entries)
    }

    /// Copy the legacy unscoped log into the profile's key, then delete it.
    ///
    /// Runs at most once per profile per process. If the scoped key already
    /// exists the legacy key is left untouched. Returns whether entries moved.
    pub fn migrate_legacy(&self, profile_id: &str) -> Result<bool> {
        let writer = self.writers.for_profile(profile_id);
        let _guard = lock_writer(&writer);
        self.migrate_scoped(profile_id)
    }

    // Caller holds the profile's writer lock. The legacy key is shared by all
    // profiles, so `checked_profiles` stays locked for the whole move.
    fn migrate_scoped(&self, profile_id: &str) -> Result<bool> {
        let mut checked = self
            .checked_profiles
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if checked.contains(profile_id) {
            return Ok(false);
        }

        let scoped_key = self.config.audit_key(profile_id);
        let legacy_key = self.config.audit_namespace.as_str();

        if self.store.contains(&scoped_key)? {
            checked.insert(profile_id.to_string());
            return Ok(false);
        }

        let Some(legacy) = load_json::<Vec<AuditEntry>, _>(self.store.as_ref(), legacy_key)? else {
            checked.insert(profile_id.to_string());
            return Ok(false);
        };

        save_json(self.store.as_ref(), &scoped_key, &legacy)?;
        self.store.remove(legacy_key)?;
        checked.insert(profile_id.to_string());

        tracing::info!(
            profile = %profile_id,
            entries = legacy.len(),
            "Migrated legacy audit log into profile scope"
        );
        Ok(true)
    }

    pub(crate) fn append(&self, profile_id: &str, entry: AuditEntry) -> Result<()> {
        let writer = self.writers.for_profile(profile_id);
        let _guard = lock_writer(&writer);
        self.migrate_scoped(profile_id)?;

        let mut entries = self.load(profile_id)?;
        entries.push(entry);

        if let Some(max) = self.config.max_audit_entries {
            let overflow = entries.len().saturating_sub(max);
            entries.drain(..overflow);
        }

        save_json(
            self.store.as_ref(),
            &self.config.audit_key(profile_id),
            &entries,
        )
    }

    fn load(&self, profile_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(
            load_json(self.store.as_ref(), &self.config.audit_key(profile_id))?
                .unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::ErrorKind;
    use crate::models::AuditAction;
    use crate::report::CollectingReporter;
    use chrono::{DateTime, Duration};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, Arc<CollectingReporter>, AuditStore) {
        let store = Arc::new(MemoryStore::new());
        let reporter = Arc::new(CollectingReporter::new());
        let audit = AuditStore::new(store.clone(), SyncConfig::default(), reporter.clone());
        (store, reporter, audit)
    }

    fn change(profile: &str, transaction: &str) -> TransactionChange {
        TransactionChange::new(profile, transaction, AuditAction::Update, "device-1")
            .with_previous_state(Some(json!({ "amount": 1 })))
            .with_new_state(Some(json!({ "amount": 2 })))
    }

    fn entry_at(transaction: &str, changed_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id: AuditEntryId::new(),
            action: AuditAction::Create,
            transaction_id: transaction.to_string(),
            changed_at,
            changed_by: "device-1".to_string(),
            previous_state: None,
            new_state: None,
        }
    }

    #[test]
    fn log_and_read_back() {
        let (_, _, audit) = setup();

        let entry = audit.log_transaction_change(change("profile-a", "txn-1")).unwrap();
        let logs = audit.get_recent_audit_logs("profile-a", None).unwrap();

        assert_eq!(logs, vec![entry]);
        assert_eq!(logs[0].previous_state, Some(json!({ "amount": 1 })));
        assert_eq!(logs[0].new_state, Some(json!({ "amount": 2 })));
    }

    #[test]
    fn profiles_are_isolated() {
        let (_, _, audit) = setup();

        audit.log_transaction_change(change("profile-a", "txn-a1"));
        audit.log_transaction_change(change("profile-a", "txn-a2"));
        audit.log_transaction_change(change("profile-b", "txn-b1"));

        let b_logs = audit.get_recent_audit_logs("profile-b", None).unwrap();
        assert_eq!(b_logs.len(), 1);
        assert_eq!(b_logs[0].transaction_id, "txn-b1");

        let a_logs = audit.get_recent_audit_logs("profile-a", None).unwrap();
        assert!(a_logs.iter().all(|entry| entry.transaction_id.starts_with("txn-a")));
        assert!(audit
            .get_recent_audit_logs("profile-c", None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn limit_keeps_newest_entries_in_ascending_order() {
        let (_, _, audit) = setup();
        let base = Utc::now();

        for offset in 0..20 {
            audit
                .append("p", entry_at(&format!("txn-{offset}"), base + Duration::seconds(offset)))
                .unwrap();
        }

        let logs = audit.get_recent_audit_logs("p", Some(10)).unwrap();
        let ids: Vec<_> = logs.iter().map(|entry| entry.transaction_id.clone()).collect();
        let expected: Vec<_> = (10..20).map(|offset| format!("txn-{offset}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn ordering_uses_timestamp_then_insertion() {
        let (_, _, audit) = setup();
        let base = Utc::now();

        audit.append("p", entry_at("late", base + Duration::seconds(5))).unwrap();
        audit.append("p", entry_at("tie-1", base)).unwrap();
        audit.append("p", entry_at("tie-2", base)).unwrap();

        let logs = audit.get_recent_audit_logs("p", None).unwrap();
        let ids: Vec<_> = logs.iter().map(|entry| entry.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["tie-1", "tie-2", "late"]);
    }

    #[test]
    fn legacy_log_is_migrated_once_and_deleted() {
        let (store, _, audit) = setup();
        let legacy = vec![entry_at("old-1", Utc::now()), entry_at("old-2", Utc::now())];
        save_json(store.as_ref(), "tally-audit", &legacy).unwrap();

        let first = audit.get_recent_audit_logs("profile-a", None).unwrap();
        assert_eq!(first.len(), 2);
        assert!(!store.contains("tally-audit").unwrap());

        let second = audit.get_recent_audit_logs("profile-a", None).unwrap();
        assert_eq!(second, first);

        // a fresh store instance over the same data must not duplicate either
        let reopened = AuditStore::new(
            store.clone(),
            SyncConfig::default(),
            Arc::new(CollectingReporter::new()),
        );
        assert_eq!(reopened.get_recent_audit_logs("profile-a", None).unwrap().len(), 2);
    }

    #[test]
    fn legacy_log_ignored_when_scoped_key_exists() {
        let (store, _, audit) = setup();
        save_json(store.as_ref(), "tally-audit-profile-a", &Vec::<AuditEntry>::new()).unwrap();
        save_json(store.as_ref(), "tally-audit", &vec![entry_at("old", Utc::now())]).unwrap();

        assert!(!audit.migrate_legacy("profile-a").unwrap());
        assert!(audit.get_recent_audit_logs("profile-a", None).unwrap().is_empty());
        assert!(store.contains("tally-audit").unwrap());
    }

    #[test]
    fn first_write_migrates_before_appending() {
        let (store, _, audit) = setup();
        save_json(store.as_ref(), "tally-audit", &vec![entry_at("old", Utc::now())]).unwrap();

        audit.log_transaction_change(change("profile-a", "new")).unwrap();

        let logs = audit.get_recent_audit_logs("profile-a", None).unwrap();
        let ids: Vec<_> = logs.iter().map(|entry| entry.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["old", "new"]);
    }

    #[test]
    fn write_failures_are_reported_not_raised() {
        let (store, reporter, audit) = setup();
        store.fail_key("tally-audit-profile-a");

        assert!(audit.log_transaction_change(change("profile-a", "txn")).is_none());

        let reports = reporter.drain();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ErrorKind::StorageFailure);
    }

    #[test]
    fn concurrent_writers_never_lose_entries() {
        let (_, reporter, audit) = setup();

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let audit = &audit;
                scope.spawn(move || {
                    for n in 0..50 {
                        audit
                            .log_transaction_change(change("p", &format!("w{worker}-{n}")))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(audit.get_recent_audit_logs("p", None).unwrap().len(), 400);
        assert!(reporter.is_empty());
    }

    #[test]
    fn cap_trims_oldest_entries() {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditStore::new(
            store,
            SyncConfig::default().with_max_audit_entries(2),
            Arc::new(CollectingReporter::new()),
        );

        for transaction in ["a", "b", "c"] {
            audit.log_transaction_change(change("p", transaction));
        }

        let logs = audit.get_recent_audit_logs("p", None).unwrap();
        let ids: Vec<_> = logs.iter().map(|entry| entry.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
