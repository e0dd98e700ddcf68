use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_core::models::ChangeOperation;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Offline-first ledger sync with audit history and restore points")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote and identity configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sync state and pending changes
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply a change locally and queue it for sync
    Queue {
        /// Record (transaction) ID
        record_id: String,
        /// create, update or delete
        operation: ChangeOperation,
        /// Record payload as JSON
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
    /// Push pending changes and pull remote state
    Sync {
        /// Fail when any record conflicts
        #[arg(long)]
        strict: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the profile's audit log
    Audit {
        /// Number of most recent entries to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage restore points
    Restore {
        #[command(subcommand)]
        command: RestoreCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum RestoreCommands {
    /// Snapshot the current local state
    Create {
        /// Restore point label
        label: String,
    },
    /// List restore points, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace local state with a restore point's snapshot
    Apply {
        /// Restore point ID
        id: String,
    },
    /// Delete a restore point
    Delete {
        /// Restore point ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Remote ledger service base URL
        #[arg(long, value_name = "URL")]
        remote_url: Option<String>,
        /// Authenticated user ID
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Device ID recorded in audit entries
        #[arg(long, value_name = "ID")]
        device_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}
