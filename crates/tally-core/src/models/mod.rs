//! Data models for Tally

mod audit_entry;
mod identity;
mod pending_change;
mod record;
mod restore_point;
mod sync_conflict;

pub use audit_entry::{AuditAction, AuditEntry, AuditEntryId, TransactionChange};
pub use identity::{Identity, IdentityProvider, SessionIdentity};
pub use pending_change::{ChangeOperation, PendingChange};
pub use record::{LocalState, SyncRecord};
pub use restore_point::{RestorePoint, RestorePointId};
pub use sync_conflict::{ConflictResolution, SyncConflict};
