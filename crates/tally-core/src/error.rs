//! Error types for tally-core

use thiserror::Error;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No user identity is present; checked before any network call
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Connectivity is down; checked before any network call
    #[error("Offline")]
    Offline,

    /// Transient network or remote service failure
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Conflicting concurrent edit, raised only when a caller demands a conflict-free sync
    #[error("Version conflict on record {record_id}")]
    VersionConflict { record_id: String },

    /// Restore point or record missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local durable store read/write failure
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Another reconciliation is already running for this profile
    #[error("Sync already in progress")]
    SyncInProgress,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Closed classification of [`Error`] for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotAuthenticated,
    Offline,
    RemoteUnavailable,
    VersionConflict,
    NotFound,
    StorageFailure,
    SyncInProgress,
    InvalidInput,
}

impl Error {
    /// Map this error onto the closed taxonomy.
    ///
    /// Serialization and SQLite errors both surface as `StorageFailure`:
    /// they only ever come from the local durable store.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::Offline => ErrorKind::Offline,
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Self::VersionConflict { .. } => ErrorKind::VersionConflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StorageFailure(_) | Self::Serialization(_) | Self::Database(_) => {
                ErrorKind::StorageFailure
            }
            Self::SyncInProgress => ErrorKind::SyncInProgress,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Whether retrying the same call later may succeed without user action.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_) | Self::SyncInProgress)
    }
}
