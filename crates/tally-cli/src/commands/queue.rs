use std::path::Path;

use tally_core::models::ChangeOperation;
use tally_core::PendingChange;

use crate::commands::common::{normalize_record_id, open_coordinator, parse_payload};
use crate::config_profiles::ResolvedProfile;
use crate::error::CliError;

/// Apply the change to local state and queue it. Returns the pending count.
pub fn queue_record_change(
    record_id: &str,
    operation: ChangeOperation,
    payload: Option<&str>,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<usize, CliError> {
    let record_id = normalize_record_id(record_id)?;
    let payload = parse_payload(operation, payload)?;

    let coordinator = open_coordinator(db_path, profile)?;
    let pending = coordinator.apply_local_change(PendingChange::new(record_id, operation, payload));
    // the process exits right after; nothing is left to drive the timer
    coordinator.shutdown();
    pending.map_err(CliError::from)
}

pub fn run_queue(
    record_id: &str,
    operation: ChangeOperation,
    payload: Option<&str>,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<(), CliError> {
    let pending = queue_record_change(record_id, operation, payload, db_path, profile)?;
    println!(
        "Queued {operation} for {} ({pending} pending)",
        record_id.trim()
    );
    Ok(())
}
