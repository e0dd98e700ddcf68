use std::path::Path;

use tally_core::models::RestorePoint;
use tally_core::LocalState;

use crate::cli::RestoreCommands;
use crate::commands::common::{format_restore_point_lines, open_coordinator, parse_restore_point_id};
use crate::config_profiles::ResolvedProfile;
use crate::error::CliError;

pub fn create_restore_point(
    label: &str,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<RestorePoint, CliError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(CliError::EmptyLabel);
    }

    let coordinator = open_coordinator(db_path, profile)?;
    let snapshot = coordinator.local_state()?;
    Ok(coordinator
        .context()
        .restore_points()
        .create_restore_point(&profile.name, label, snapshot)?)
}

pub fn list_restore_points(
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<Vec<RestorePoint>, CliError> {
    let coordinator = open_coordinator(db_path, profile)?;
    Ok(coordinator
        .context()
        .restore_points()
        .get_restore_points(&profile.name)?)
}

pub fn apply_restore_point(
    id: &str,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<LocalState, CliError> {
    let id = parse_restore_point_id(id)?;
    let coordinator = open_coordinator(db_path, profile)?;
    let restored = coordinator.restore_from(id)?;
    coordinator.shutdown();
    Ok(restored)
}

pub fn delete_restore_point(
    id: &str,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<(), CliError> {
    let id = parse_restore_point_id(id)?;
    let coordinator = open_coordinator(db_path, profile)?;
    Ok(coordinator
        .context()
        .restore_points()
        .delete_restore_point(&profile.name, id)?)
}

pub fn run_restore(
    command: RestoreCommands,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<(), CliError> {
    match command {
        RestoreCommands::Create { label } => {
            let point = create_restore_point(&label, db_path, profile)?;
            println!("{}", point.id);
        }
        RestoreCommands::List { json } => {
            let points = list_restore_points(db_path, profile)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else if points.is_empty() {
                println!("No restore points.");
            } else {
                for line in format_restore_point_lines(&points) {
                    println!("{line}");
                }
            }
        }
        RestoreCommands::Apply { id } => {
            let state = apply_restore_point(&id, db_path, profile)?;
            println!("Restored {} records", state.len());
        }
        RestoreCommands::Delete { id } => {
            delete_restore_point(&id, db_path, profile)?;
            println!("Deleted restore point {}", id.trim());
        }
    }
    Ok(())
}
