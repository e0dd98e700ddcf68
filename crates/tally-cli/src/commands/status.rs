use std::path::Path;

use tally_core::SyncStatus;

use crate::commands::common::{format_status_lines, open_coordinator};
use crate::config_profiles::ResolvedProfile;
use crate::error::CliError;

pub fn load_status(db_path: &Path, profile: &ResolvedProfile) -> Result<SyncStatus, CliError> {
    Ok(open_coordinator(db_path, profile)?.status())
}

pub fn run_status(as_json: bool, db_path: &Path, profile: &ResolvedProfile) -> Result<(), CliError> {
    let status = load_status(db_path, profile)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for line in format_status_lines(&profile.name, &status) {
        println!("{line}");
    }
    Ok(())
}
