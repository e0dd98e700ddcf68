//! Tally CLI - command-line surface over the offline-first sync engine
//!
//! Queue changes, sync with the remote ledger and inspect audit history and
//! restore points for a profile.

mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::audit::run_audit;
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::queue::run_queue;
use crate::commands::restore::run_restore;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "tally=info,tally_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile = profiles.resolve(cli.profile.as_deref());
    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Status { json } => run_status(json, &db_path, &profile)?,
        Commands::Queue {
            record_id,
            operation,
            payload,
        } => run_queue(&record_id, operation, payload.as_deref(), &db_path, &profile)?,
        Commands::Sync { strict, json } => run_sync(strict, json, &db_path, &profile).await?,
        Commands::Audit { limit, json } => run_audit(limit, json, &db_path, &profile)?,
        Commands::Restore { command } => run_restore(command, &db_path, &profile)?,
        Commands::Config { command } => run_config(command, cli.profile.as_deref())?,
    }

    Ok(())
}
