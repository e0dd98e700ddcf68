//! Persistent pending-change queue

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::SyncConfig;
use crate::db::{load_json, save_json, KeyValueStore};
use crate::error::Result;
use crate::models::PendingChange;

/// Per-profile queue of local mutations awaiting push.
///
/// Every mutation writes through to the store before returning, so queued
/// changes survive restarts.
pub struct PendingQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    changes: Vec<PendingChange>,
}

impl PendingQueue {
    /// Load the queue for `profile_id`
    pub fn load(store: Arc<dyn KeyValueStore>, config: &SyncConfig, profile_id: &str) -> Result<Self> {
        let key = config.queue_key(profile_id);
        let changes = load_json(store.as_ref(), &key)?.unwrap_or_default();
        Ok(Self {
            store,
            key,
            changes,
        })
    }

    /// Append a change; returns the new queue length
    pub fn push(&mut self, change: PendingChange) -> Result<usize> {
        let mut next = self.changes.clone();
        next.push(change);
        self.persist(next)?;
        Ok(self.changes.len())
    }

    /// Drop the changes whose ids were accepted by the remote
    pub fn remove_ids(&mut self, ids: &HashSet<Uuid>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let before = self.changes.len();
        let next: Vec<_> = self
            .changes
            .iter()
            .filter(|change| !ids.contains(&change.id))
            .cloned()
            .collect();
        self.persist(next)?;
        Ok(before - self.changes.len())
    }

    /// Drop every queued change for `record_id`
    pub fn remove_record(&mut self, record_id: &str) -> Result<usize> {
        let before = self.changes.len();
        let next: Vec<_> = self
            .changes
            .iter()
            .filter(|change| change.record_id != record_id)
            .cloned()
            .collect();
        if next.len() == before {
            return Ok(0);
        }
        self.persist(next)?;
        Ok(before - self.changes.len())
    }

    pub fn changes(&self) -> &[PendingChange] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether any queued change deletes a record
    pub fn has_destructive(&self) -> bool {
        self.changes.iter().any(PendingChange::is_destructive)
    }

    // Memory only changes once the store accepted the write.
    fn persist(&mut self, next: Vec<PendingChange>) -> Result<()> {
        save_json(self.store.as_ref(), &self.key, &next)?;
        self.changes = next;
        Ok(())
    }
}
