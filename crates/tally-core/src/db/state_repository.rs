//! Profile state repository implementation

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::LocalState;

use super::{load_json, save_json, KeyValueStore};

/// Reads and replaces the current exported state of a profile
#[derive(Clone)]
pub struct LocalStateRepository {
    store: Arc<dyn KeyValueStore>,
    config: SyncConfig,
}

impl LocalStateRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// Load the profile's state; a profile never written is empty
    pub fn load(&self, profile_id: &str) -> Result<LocalState> {
        Ok(load_json(self.store.as_ref(), &self.config.state_key(profile_id))?.unwrap_or_default())
    }

    /// Replace the profile's state
    pub fn save(&self, profile_id: &str, state: &LocalState) -> Result<()> {
        save_json(self.store.as_ref(), &self.config.state_key(profile_id), state)
    }
}
