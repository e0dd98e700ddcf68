use std::path::Path;

use tally_core::models::AuditEntry;

use crate::commands::common::{format_audit_lines, open_coordinator};
use crate::config_profiles::ResolvedProfile;
use crate::error::CliError;

pub fn list_audit_entries(
    limit: Option<usize>,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<Vec<AuditEntry>, CliError> {
    let coordinator = open_coordinator(db_path, profile)?;
    Ok(coordinator
        .context()
        .audit()
        .get_recent_audit_logs(&profile.name, limit)?)
}

pub fn run_audit(
    limit: Option<usize>,
    as_json: bool,
    db_path: &Path,
    profile: &ResolvedProfile,
) -> Result<(), CliError> {
    let entries = list_audit_entries(limit, db_path, profile)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No audit entries recorded.");
        return Ok(());
    }

    for line in format_audit_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}
