use std::path::Path;

use tally_core::SyncOutcome;

use crate::commands::common::{format_conflict_lines, open_coordinator};
use crate::config_profiles::ResolvedProfile;
use crate::error::CliError;

pub async fn sync_profile(
    strict: bool,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<SyncOutcome, CliError> {
    if profile.settings.remote_url().is_none() {
        return Err(CliError::RemoteNotConfigured);
    }

    let coordinator = open_coordinator(db_path, profile)?;
    let state = coordinator.local_state()?;
    let outcome = coordinator.sync_data(&state).await?;

    if strict {
        Ok(outcome.require_conflict_free()?)
    } else {
        Ok(outcome)
    }
}

pub async fn run_sync(
    strict: bool,
    as_json: bool,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<(), CliError> {
    let outcome = sync_profile(strict, db_path, profile).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!(
        "Sync completed: {} pushed, {} pulled, {} conflict(s)",
        outcome.synced.len(),
        outcome.pulled.len(),
        outcome.conflicts.len()
    );
    for line in format_conflict_lines(&outcome.conflicts) {
        println!("{line}");
    }
    for rejected in &outcome.rejected {
        println!("rejected: {} ({})", rejected.record_id, rejected.reason);
    }
    Ok(())
}
