//! Local durable key-value store for Tally

mod connection;
mod locks;
mod memory;
mod migrations;
mod state_repository;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use connection::Database;
pub use locks::{lock_writer, ProfileLocks};
pub use memory::MemoryStore;
pub use state_repository::LocalStateRepository;

/// Trait for local durable storage operations
///
/// Values are JSON documents keyed by `"<namespace>-<profile_id>"` (or the bare
/// namespace for legacy unscoped data).
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a raw value, replacing any existing one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Check whether a key exists
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Read and deserialize a JSON document
pub fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    store
        .get(key)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(Into::into)
}

/// Serialize and write a JSON document
pub fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_helpers_roundtrip_through_store() {
        let store = MemoryStore::new();
        save_json(&store, "numbers", &vec![1, 2, 3]).unwrap();

        let loaded: Option<Vec<i32>> = load_json(&store, "numbers").unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        let missing: Option<Vec<i32>> = load_json(&store, "other").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn load_json_reports_corrupt_documents() {
        let store = MemoryStore::new();
        store.set("numbers", "not json").unwrap();

        let result: Result<Option<Vec<i32>>> = load_json(&store, "numbers");
        assert!(result.is_err());
    }
}
