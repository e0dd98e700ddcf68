//! Per-profile write serialization

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One lock per profile.
///
/// Read-modify-write sequences against a profile's documents hold the
/// profile's lock for their whole duration. Different profiles never contend.
#[derive(Debug, Default)]
pub struct ProfileLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProfileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `profile_id`, created on first use.
    ///
    /// Callers keep the returned `Arc` alive and hold `lock_writer(&handle)`
    /// for the duration of the write.
    pub fn for_profile(&self, profile_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(profile_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Acquire a profile lock, ignoring poisoning from a panicked writer
pub fn lock_writer(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
