use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tally_core::db::Database;
use tally_core::models::{AuditEntry, ChangeOperation, RestorePoint, RestorePointId, SessionIdentity};
use tally_core::report::TracingReporter;
use tally_core::sync::{
    ConnectivitySignal, HttpRemoteStore, PushOutcome, RemoteSnapshot, RemoteStore,
};
use tally_core::{PendingChange, SyncConfig, SyncConflict, SyncContext, SyncCoordinator, SyncStatus};

use crate::config_profiles::{ResolvedProfile, REMOTE_TOKEN_ENV};
use crate::error::CliError;

/// Remote for the active profile; local-only commands work without one
pub enum ProfileRemote {
    Http(HttpRemoteStore),
    Unconfigured,
}

impl ProfileRemote {
    pub fn for_profile(profile: &ResolvedProfile) -> Result<Self, CliError> {
        match profile.settings.remote_url() {
            Some(url) => Ok(Self::Http(HttpRemoteStore::new(
                url,
                env::var(REMOTE_TOKEN_ENV).ok(),
            )?)),
            None => Ok(Self::Unconfigured),
        }
    }
}

fn remote_not_configured() -> tally_core::Error {
    tally_core::Error::RemoteUnavailable("no remote configured for this profile".to_string())
}

impl RemoteStore for ProfileRemote {
    async fn fetch_state(&self, profile_id: &str) -> tally_core::Result<RemoteSnapshot> {
        match self {
            Self::Http(remote) => remote.fetch_state(profile_id).await,
            Self::Unconfigured => Err(remote_not_configured()),
        }
    }

    async fn push_changes(
        &self,
        profile_id: &str,
        changes: &[PendingChange],
    ) -> tally_core::Result<PushOutcome> {
        match self {
            Self::Http(remote) => remote.push_changes(profile_id, changes).await,
            Self::Unconfigured => Err(remote_not_configured()),
        }
    }
}

pub type CliCoordinator = SyncCoordinator<ProfileRemote>;

pub fn open_coordinator(
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<CliCoordinator, CliError> {
    let db = Database::open(db_path)?;
    let context = SyncContext::new(
        Arc::new(db),
        SyncConfig::default(),
        Arc::new(TracingReporter),
    );
    let remote = ProfileRemote::for_profile(profile)?;
    let identity = SessionIdentity::new(profile.settings.identity());

    Ok(SyncCoordinator::new(
        profile.name.clone(),
        context,
        Arc::new(remote),
        Arc::new(identity),
        Arc::new(ConnectivitySignal::default()),
    )?)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("TALLY_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("tally").join("tally.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn normalize_record_id(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyRecordId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a `--payload` argument; deletes default to `null`, writes to `{}`
pub fn parse_payload(operation: ChangeOperation, raw: Option<&str>) -> Result<Value, CliError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => {
            serde_json::from_str(raw).map_err(|error| CliError::InvalidPayload(error.to_string()))
        }
        None if operation == ChangeOperation::Delete => Ok(Value::Null),
        None => Ok(Value::Object(serde_json::Map::new())),
    }
}

pub fn parse_restore_point_id(raw: &str) -> Result<RestorePointId, CliError> {
    raw.trim()
        .parse::<RestorePointId>()
        .map_err(|_| CliError::InvalidRestorePointId(raw.trim().to_string()))
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_version(version: Option<u64>) -> String {
    version.map_or_else(|| "-".to_string(), |version| version.to_string())
}

pub fn format_status_lines(profile: &str, status: &SyncStatus) -> Vec<String> {
    let last_sync = status
        .last_sync_at
        .map_or_else(|| "never".to_string(), format_timestamp);
    vec![
        format!("Profile: {profile}"),
        format!("State: {}", status.display_state()),
        format!("Pending changes: {}", status.pending_changes),
        format!("Last sync: {last_sync}"),
    ]
}

pub fn format_audit_lines(entries: &[AuditEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {:<7}  {}  by {}",
                format_timestamp(entry.changed_at),
                entry.action.as_str(),
                entry.transaction_id,
                entry.changed_by
            )
        })
        .collect()
}

pub fn format_restore_point_lines(points: &[RestorePoint]) -> Vec<String> {
    points
        .iter()
        .map(|point| {
            format!(
                "{}  {}  {} ({} records)",
                point.id,
                format_timestamp(point.created_at),
                point.label,
                point.snapshot.len()
            )
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "conflict: {} local={} remote={}",
                conflict.record_id,
                format_version(conflict.local_version),
                format_version(conflict.remote_version)
            )
        })
        .collect()
}
