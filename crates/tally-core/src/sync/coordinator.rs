//! Per-profile sync coordinator.
//!
//! Owns the pending queue, the debounced auto-sync trigger and the sync
//! session state for one profile. `sync_data` is the only operation that
//! touches the network; everything else completes against the local store
//! before returning.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::audit::AuditStore;
use crate::config::SyncConfig;
use crate::db::{lock_writer, KeyValueStore, LocalStateRepository, ProfileLocks};
use crate::error::{Error, Result};
use crate::models::{
    AuditAction, ChangeOperation, ConflictResolution, IdentityProvider, LocalState, PendingChange,
    RestorePointId, SyncConflict, TransactionChange,
};
use crate::report::ErrorReporter;
use crate::restore::{RestorePointManager, RestoredState};
use crate::state::{SyncState, SyncStatus};

use super::connectivity::ConnectivityProbe;
use super::debounce::DebouncedTrigger;
use super::merge::{apply_push_outcome, reconcile, PulledChange, Reconciliation};
use super::queue::PendingQueue;
use super::remote::{PushOutcome, RejectedChange, RemoteStore};

const UNKNOWN_DEVICE: &str = "unknown-device";

/// Storage-backed services shared by every coordinator in a process
#[derive(Clone)]
pub struct SyncContext {
    store: Arc<dyn KeyValueStore>,
    config: SyncConfig,
    reporter: Arc<dyn ErrorReporter>,
    audit: Arc<AuditStore>,
    restore_points: Arc<RestorePointManager>,
    /// Serializes writes to each profile's local state and pending queue
    writers: Arc<ProfileLocks>,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: SyncConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let audit = Arc::new(AuditStore::new(
            store.clone(),
            config.clone(),
            reporter.clone(),
        ));
        let restore_points = Arc::new(RestorePointManager::new(
            store.clone(),
            config.clone(),
            audit.clone(),
        ));
        Self {
            store,
            config,
            reporter,
            audit,
            restore_points,
            writers: Arc::new(ProfileLocks::new()),
        }
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub const fn audit(&self) -> &Arc<AuditStore> {
        &self.audit
    }

    pub const fn restore_points(&self) -> &Arc<RestorePointManager> {
        &self.restore_points
    }

    pub const fn reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.reporter
    }
}

/// Result of a completed `sync_data` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    /// Records whose pending changes the remote accepted
    pub synced: Vec<String>,
    /// Records taken from the remote without local edits
    pub pulled: Vec<String>,
    /// Records left for the caller to resolve; their changes stay queued
    pub conflicts: Vec<SyncConflict>,
    pub rejected: Vec<RejectedChange>,
    /// Merged state as written to the local store
    pub state: LocalState,
    pub synced_at: DateTime<Utc>,
}

impl SyncOutcome {
    pub fn is_conflict_free(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Turn the first conflict into `Error::VersionConflict`
    pub fn require_conflict_free(self) -> Result<Self> {
        match self.conflicts.first() {
            Some(conflict) => Err(Error::VersionConflict {
                record_id: conflict.record_id.clone(),
            }),
            None => Ok(self),
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    sync_state: SyncState,
    last_sync_at: Option<DateTime<Utc>>,
    acknowledged_trigger: u64,
    /// Conflicts reported by the last completed sync and not yet resolved
    conflicts: Vec<SyncConflict>,
}

/// Marks the session `Syncing` for its lifetime; anything but `complete`
/// leaves it in `Error`, including the caller dropping the future.
struct SyncAttempt<'a> {
    session: &'a Mutex<Session>,
    profile_id: &'a str,
    completed: bool,
}

impl<'a> SyncAttempt<'a> {
    fn begin(session: &'a Mutex<Session>, profile_id: &'a str) -> Self {
        lock(session).sync_state = SyncState::Syncing;
        Self {
            session,
            profile_id,
            completed: false,
        }
    }

    fn complete(mut self, synced_at: DateTime<Utc>, trigger: u64, conflicts: Vec<SyncConflict>) {
        let mut session = lock(self.session);
        session.sync_state = SyncState::Idle;
        session.last_sync_at = Some(synced_at);
        session.acknowledged_trigger = session.acknowledged_trigger.max(trigger);
        session.conflicts = conflicts;
        drop(session);
        self.completed = true;
    }
}

impl Drop for SyncAttempt<'_> {
    fn drop(&mut self) {
        if !self.completed {
            lock(self.session).sync_state = SyncState::Error;
            tracing::warn!(profile = %self.profile_id, "Sync did not complete");
        }
    }
}

/// Coordinates queueing and reconciliation for a single profile
pub struct SyncCoordinator<R> {
    profile_id: String,
    context: SyncContext,
    states: LocalStateRepository,
    remote: Arc<R>,
    identity: Arc<dyn IdentityProvider>,
    connectivity: Arc<dyn ConnectivityProbe>,
    /// Last connectivity event; `connectivity` must agree before a sync
    online: AtomicBool,
    queue: Mutex<PendingQueue>,
    session: Mutex<Session>,
    trigger: DebouncedTrigger,
    running: tokio::sync::Mutex<()>,
}

impl<R: RemoteStore> SyncCoordinator<R> {
    /// Create a coordinator, reloading any changes queued by a previous run
    pub fn new(
        profile_id: impl Into<String>,
        context: SyncContext,
        remote: Arc<R>,
        identity: Arc<dyn IdentityProvider>,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Result<Self> {
        let profile_id = profile_id.into();
        if profile_id.trim().is_empty() {
            return Err(Error::InvalidInput("profile id must not be empty".to_string()));
        }

        let queue = PendingQueue::load(context.store.clone(), &context.config, &profile_id)?;
        let states = LocalStateRepository::new(context.store.clone(), context.config.clone());
        let trigger = DebouncedTrigger::new(context.config.debounce);

        tracing::debug!(profile = %profile_id, pending = queue.len(), "Sync coordinator ready");

        Ok(Self {
            profile_id,
            context,
            states,
            remote,
            identity,
            connectivity,
            online: AtomicBool::new(true),
            queue: Mutex::new(queue),
            session: Mutex::new(Session::default()),
            trigger,
            running: tokio::sync::Mutex::new(()),
        })
    }

    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    pub const fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Queue a change the caller already applied to local state.
    ///
    /// Persists the change, appends an audit entry and restarts the debounce
    /// timer. Works offline. Returns the number of pending changes.
    pub fn queue_change(&self, change: PendingChange) -> Result<usize> {
        let writer = self.context.writers.for_profile(&self.profile_id);
        let _guard = lock_writer(&writer);
        let previous = match self.states.load(&self.profile_id) {
            Ok(state) => state.get(&change.record_id).map(|record| record.data.clone()),
            Err(error) => {
                self.context
                    .reporter
                    .report("Failed to read local state for audit", &error);
                None
            }
        };
        self.enqueue(change, previous)
    }

    /// Apply a change to the stored local state, then queue it
    pub fn apply_local_change(&self, change: PendingChange) -> Result<usize> {
        let writer = self.context.writers.for_profile(&self.profile_id);
        let _guard = lock_writer(&writer);
        let mut state = self.states.load(&self.profile_id)?;
        let previous = state.get(&change.record_id).map(|record| record.data.clone());
        state.apply_change(&change);
        self.states.save(&self.profile_id, &state)?;
        self.enqueue(change, previous)
    }

    // Caller holds the profile's writer lock.
    fn enqueue(&self, change: PendingChange, previous: Option<Value>) -> Result<usize> {
        let new_state = match change.operation {
            ChangeOperation::Delete => None,
            ChangeOperation::Create | ChangeOperation::Update => Some(change.payload.clone()),
        };
        let audit = TransactionChange::new(
            &self.profile_id,
            &change.record_id,
            change.operation.into(),
            self.changed_by(),
        )
        .with_previous_state(previous)
        .with_new_state(new_state);

        let pending = self.push_pending(change)?;
        self.context.audit.log_transaction_change(audit);
        Ok(pending)
    }

    fn push_pending(&self, change: PendingChange) -> Result<usize> {
        let operation = change.operation;
        let record_id = change.record_id.clone();

        let pending = lock(&self.queue).push(change)?;

        self.trigger.schedule();
        tracing::debug!(
            profile = %self.profile_id,
            record = %record_id,
            pending,
            "Queued {operation} change"
        );
        Ok(pending)
    }

    /// Reconcile `local_state` and the pending queue with the remote.
    ///
    /// Identity and connectivity are checked first and fail without side
    /// effects. A second call while one is running fails with
    /// `SyncInProgress`. Remote failures leave the queue intact and the
    /// session in `Error`.
    pub async fn sync_data(&self, local_state: &LocalState) -> Result<SyncOutcome> {
        let Some(identity) = self.identity.current_identity() else {
            return Err(Error::NotAuthenticated);
        };
        if !self.is_online() {
            return Err(Error::Offline);
        }
        let Ok(_running) = self.running.try_lock() else {
            return Err(Error::SyncInProgress);
        };

        let attempt = SyncAttempt::begin(&self.session, &self.profile_id);
        let pending = lock(&self.queue).changes().to_vec();
        let flushed: HashSet<Uuid> = pending.iter().map(|change| change.id).collect();
        self.capture_restore_point(local_state, &pending);

        let snapshot = self
            .remote_call("fetch", self.remote.fetch_state(&self.profile_id))
            .await?;

        let now = Utc::now();
        let Reconciliation {
            to_push,
            conflicts,
            pulled,
            mut merged,
        } = reconcile(local_state, &snapshot, &pending, now);

        let pushed = if to_push.is_empty() {
            PushOutcome::default()
        } else {
            self.remote_call("push", self.remote.push_changes(&self.profile_id, &to_push))
                .await?
        };
        apply_push_outcome(&mut merged, &pushed, now);

        let accepted: HashSet<Uuid> = pushed.accepted.iter().copied().collect();
        self.commit(&mut merged, &flushed, &accepted)?;

        for change in &pulled {
            self.log_pulled(change, &identity.device_id);
        }
        for rejected in &pushed.rejected {
            tracing::warn!(
                profile = %self.profile_id,
                record = %rejected.record_id,
                "Remote rejected change: {}",
                rejected.reason
            );
        }

        let mut synced: Vec<String> = Vec::new();
        for change in to_push.iter().filter(|change| accepted.contains(&change.id)) {
            if !synced.contains(&change.record_id) {
                synced.push(change.record_id.clone());
            }
        }

        attempt.complete(now, self.trigger.fired(), conflicts.clone());
        tracing::info!(
            profile = %self.profile_id,
            synced = synced.len(),
            pulled = pulled.len(),
            conflicts = conflicts.len(),
            "Sync complete"
        );

        Ok(SyncOutcome {
            synced,
            pulled: pulled.into_iter().map(|change| change.record_id).collect(),
            conflicts,
            rejected: pushed.rejected,
            state: merged,
            synced_at: now,
        })
    }

    /// Handle a platform connectivity event.
    ///
    /// Going offline forces the session back to `Idle` without touching the
    /// queue. Coming online only lifts the block; it never starts a sync.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        if online {
            tracing::info!(profile = %self.profile_id, "Connectivity restored");
        } else {
            lock(&self.session).sync_state = SyncState::Idle;
            tracing::info!(profile = %self.profile_id, "Connectivity lost; sync paused");
        }
    }

    /// Online only while the last connectivity event and `connectivity`,
    /// read on every call, both say so
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst) && self.connectivity.is_online()
    }

    /// Roll the profile back to one of its restore points.
    ///
    /// The snapshot replaces local state and one `restore` audit entry is
    /// written. Every record that differs from the state it replaced is
    /// queued, so the next sync pushes the restored data instead of pulling
    /// the remote copy back over it.
    pub fn restore_from(&self, id: RestorePointId) -> Result<LocalState> {
        let writer = self.context.writers.for_profile(&self.profile_id);
        let _guard = lock_writer(&writer);

        let RestoredState { state, changes } =
            self.context
                .restore_points
                .restore_from(&self.profile_id, id, &self.changed_by())?;
        for change in changes {
            self.push_pending(change)?;
        }
        Ok(state)
    }

    /// Conflicts reported by the last sync that are still unresolved
    pub fn conflicts(&self) -> Vec<SyncConflict> {
        lock(&self.session).conflicts.clone()
    }

    /// Settle a conflict reported by the last sync.
    ///
    /// `KeepLocal` rebases the local record onto the remote copy's version so
    /// its queued changes push on the next sync. `KeepRemote` drops the
    /// record's queued changes and adopts the remote copy. Both write one
    /// audit entry. Fails with `NotFound` when no open conflict exists for
    /// `record_id` and with `SyncInProgress` while a sync is running.
    pub fn resolve_conflict(
        &self,
        record_id: &str,
        resolution: ConflictResolution,
    ) -> Result<LocalState> {
        let Ok(_running) = self.running.try_lock() else {
            return Err(Error::SyncInProgress);
        };
        let writer = self.context.writers.for_profile(&self.profile_id);
        let _guard = lock_writer(&writer);

        let conflict = lock(&self.session)
            .conflicts
            .iter()
            .find(|conflict| conflict.record_id == record_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("conflict for record {record_id}")))?;

        let mut state = self.states.load(&self.profile_id)?;
        let local_data = state.get(record_id).map(|record| record.data.clone());
        let remote_data = (!conflict.remote.deleted).then(|| conflict.remote.data.clone());
        let now = Utc::now();

        let (action, previous_state, new_state) = match resolution {
            ConflictResolution::KeepLocal => {
                if let Some(mut record) = state.get(record_id).cloned() {
                    record.version = conflict.remote.version;
                    record.synced_at = conflict.remote.updated_at.max(Some(now));
                    state.upsert(record);
                }
                (AuditAction::Update, remote_data, local_data)
            }
            ConflictResolution::KeepRemote => {
                let dropped = lock(&self.queue).remove_record(record_id)?;
                tracing::debug!(
                    profile = %self.profile_id,
                    record = %record_id,
                    dropped,
                    "Dropped queued changes"
                );
                if conflict.remote.deleted {
                    state.remove(record_id);
                    (AuditAction::Delete, local_data, None)
                } else {
                    let mut remote = conflict.remote.clone();
                    remote.synced_at = Some(now);
                    state.upsert(remote);
                    (AuditAction::Update, local_data, remote_data)
                }
            }
        };

        self.states.save(&self.profile_id, &state)?;
        lock(&self.session)
            .conflicts
            .retain(|conflict| conflict.record_id != record_id);

        self.context.audit.log_transaction_change(
            TransactionChange::new(&self.profile_id, record_id, action, self.changed_by())
                .with_previous_state(previous_state)
                .with_new_state(new_state),
        );
        tracing::info!(
            profile = %self.profile_id,
            record = %record_id,
            ?resolution,
            "Resolved conflict"
        );
        Ok(state)
    }

    pub fn status(&self) -> SyncStatus {
        let pending_changes = lock(&self.queue).len();
        let auto_sync_trigger = self.trigger.fired();
        let session = lock(&self.session);
        SyncStatus {
            sync_state: session.sync_state,
            pending_changes,
            last_sync_at: session.last_sync_at,
            auto_sync_trigger,
            should_auto_sync: auto_sync_trigger > session.acknowledged_trigger
                && pending_changes > 0,
            is_online: self.is_online(),
        }
    }

    pub fn sync_state(&self) -> SyncState {
        lock(&self.session).sync_state
    }

    /// True once the debounce fired since the last acknowledgement and
    /// changes are still pending
    pub fn should_auto_sync(&self) -> bool {
        self.status().should_auto_sync
    }

    pub fn acknowledge_auto_sync(&self) {
        lock(&self.session).acknowledged_trigger = self.trigger.fired();
    }

    /// Watch the auto-sync trigger counter
    pub fn subscribe_auto_sync(&self) -> watch::Receiver<u64> {
        self.trigger.subscribe()
    }

    pub fn pending_changes(&self) -> Vec<PendingChange> {
        lock(&self.queue).changes().to_vec()
    }

    /// Local state as last written for this profile
    pub fn local_state(&self) -> Result<LocalState> {
        self.states.load(&self.profile_id)
    }

    /// Stop the debounce timer without firing it. Queued changes are kept.
    pub fn shutdown(&self) {
        if self.trigger.cancel() {
            tracing::debug!(profile = %self.profile_id, "Cancelled pending auto-sync");
        }
    }

    fn changed_by(&self) -> String {
        self.identity
            .current_identity()
            .map_or_else(|| UNKNOWN_DEVICE.to_string(), |identity| identity.device_id)
    }

    /// Write the reconciled state and drop the accepted changes.
    ///
    /// Accepted changes leave the queue before the state write. Changes
    /// queued after the sync took its snapshot are replayed onto `merged`.
    fn commit(
        &self,
        merged: &mut LocalState,
        flushed: &HashSet<Uuid>,
        accepted: &HashSet<Uuid>,
    ) -> Result<()> {
        let writer = self.context.writers.for_profile(&self.profile_id);
        let _guard = lock_writer(&writer);

        let mut queue = lock(&self.queue);
        queue.remove_ids(accepted)?;
        for change in queue
            .changes()
            .iter()
            .filter(|change| !flushed.contains(&change.id))
        {
            merged.apply_change(change);
        }
        drop(queue);

        self.states.save(&self.profile_id, merged)
    }

    async fn remote_call<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let limit = self.context.config.remote_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => {
                tracing::error!(profile = %self.profile_id, "Remote {operation} failed: {error}");
                Err(error)
            }
            Err(_) => {
                let error = Error::RemoteUnavailable(format!(
                    "remote {operation} timed out after {}ms",
                    limit.as_millis()
                ));
                tracing::error!(profile = %self.profile_id, "{error}");
                Err(error)
            }
        }
    }

    fn capture_restore_point(&self, local_state: &LocalState, pending: &[PendingChange]) {
        let Some(threshold) = self.context.config.bulk_restore_threshold else {
            return;
        };
        let bulk = pending.len() >= threshold.max(1);
        if !bulk && !pending.iter().any(PendingChange::is_destructive) {
            return;
        }

        let label = format!(
            "Before sync {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        if let Err(error) = self.context.restore_points.create_restore_point(
            &self.profile_id,
            label,
            local_state.clone(),
        ) {
            self.context
                .reporter
                .report("Failed to create automatic restore point", &error);
        }
    }

    fn log_pulled(&self, change: &PulledChange, changed_by: &str) {
        self.context.audit.log_transaction_change(
            TransactionChange::new(&self.profile_id, &change.record_id, change.action, changed_by)
                .with_previous_state(change.previous.as_ref().map(|record| record.data.clone()))
                .with_new_state(change.current.as_ref().map(|record| record.data.clone())),
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
