//! In-memory store for tests and ephemeral sessions

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

use super::KeyValueStore;

/// `HashMap`-backed `KeyValueStore`.
///
/// Individual keys can be marked as failing to simulate storage faults.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read and write of `key` fail with `StorageFailure`
    pub fn fail_key(&self, key: impl Into<String>) {
        lock(&self.failing_keys).insert(key.into());
    }

    /// Stop failing `key`
    pub fn heal_key(&self, key: &str) {
        lock(&self.failing_keys).remove(key);
    }

    /// Snapshot of stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = lock(&self.values).keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self, key: &str) -> Result<()> {
        if lock(&self.failing_keys).contains(key) {
            return Err(Error::StorageFailure(format!("simulated failure for {key}")));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check(key)?;
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check(key)?;
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check(key)?;
        lock(&self.values).remove(key);
        Ok(())
    }
}
