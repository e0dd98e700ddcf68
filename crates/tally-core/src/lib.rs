//! tally-core - Core library for Tally
//!
//! This crate contains the offline-first sync engine shared by every Tally
//! interface: the pending-change queue and sync coordinator, the
//! profile-scoped audit log, restore points and the local durable store.

pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod restore;
pub mod state;
pub mod sync;
pub mod util;

pub use audit::AuditStore;
pub use config::SyncConfig;
pub use error::{Error, ErrorKind, Result};
pub use models::{ConflictResolution, LocalState, PendingChange, SyncConflict, SyncRecord};
pub use restore::RestorePointManager;
pub use state::{SyncState, SyncStatus};
pub use sync::{should_create_conflict, SyncContext, SyncCoordinator, SyncOutcome};
