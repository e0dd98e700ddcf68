use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Restore point label cannot be empty")]
    EmptyLabel,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid restore point ID: {0}")]
    InvalidRestorePointId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Remote is not configured. Run `tally config init --remote-url <URL>` first.")]
    RemoteNotConfigured,
}
