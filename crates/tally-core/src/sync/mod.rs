//! Offline-first synchronization: pending queue, auto-sync trigger,
//! conflict detection and the per-profile coordinator.

mod conflict;
mod connectivity;
mod coordinator;
mod debounce;
mod http;
mod merge;
mod queue;
mod remote;

pub use conflict::{records_conflict, should_create_conflict};
pub use connectivity::{ConnectivityProbe, ConnectivitySignal};
pub use coordinator::{SyncContext, SyncCoordinator, SyncOutcome};
pub use debounce::DebouncedTrigger;
pub use http::HttpRemoteStore;
pub use merge::{apply_push_outcome, reconcile, PulledChange, Reconciliation};
pub use queue::PendingQueue;
pub use remote::{InMemoryRemote, PushOutcome, RejectedChange, RemoteSnapshot, RemoteStore};
