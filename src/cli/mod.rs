//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_RPC_TIMEOUT_MS;

pub mod commands;

/// tally - local-first issue tracking for teams
#[derive(Parser, Debug)]
#[command(name = "tally", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: .tally/tally.db in the project, else ~/.tally/tally.db)
    #[arg(long, global = true, env = "TALLY_DB")]
    pub db: Option<PathBuf>,

    /// Daemon socket path (default: daemon.sock beside the database)
    #[arg(long, global = true, env = "TALLY_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Never use the daemon; always read the database directly
    #[arg(long, global = true, env = "TALLY_NO_DAEMON")]
    pub no_daemon: bool,

    /// Read/write timeout for each daemon request, in milliseconds
    #[arg(long, global = true, env = "TALLY_RPC_TIMEOUT_MS", default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
    pub rpc_timeout_ms: u64,

    /// Read the database even if the JSONL file has changed since the last import
    #[arg(long, global = true)]
    pub allow_stale: bool,

    /// Output as JSON (for agent integration)
    #[arg(long, alias = "robot", global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a tally workspace
    Init {
        /// Use global location (~/.tally/)
        #[arg(long)]
        global: bool,

        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Show in-progress work grouped by owner
    Team(TeamArgs),

    /// Bring the database schema up to date
    Migrate {
        /// Show what would be added without changing the database
        #[arg(long)]
        dry_run: bool,

        /// Stop after this migration version
        #[arg(long)]
        to: Option<u32>,
    },

    /// Sync with JSONL files
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for `tally team`.
#[derive(clap::Args, Debug, Default)]
pub struct TeamArgs {
    /// Only show issues on this team (exact match)
    #[arg(long)]
    pub filter_team: Option<String>,

    /// Only show issues owned by this GitHub username (exact match)
    #[arg(long)]
    pub github_username: Option<String>,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Import issues from JSONL into the database
    Import {
        /// JSONL file to read (default: issues.jsonl beside the database)
        #[arg(long)]
        input: Option<PathBuf>,
    },
}
