//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Experience allocation, realm progression and progress migration for learning paths
#[derive(Parser, Debug)]
#[command(name = "pathxp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -d info, -dd debug, -ddd trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Experience configuration (.json or .toml), overrides settings
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Allocate and check every allocation invariant
    Validate {
        /// Node catalog (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        nodes: Option<PathBuf>,
    },

    /// Print the normalized allocation
    Allocate {
        /// Node catalog (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        nodes: Option<PathBuf>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Explain the experience formula of one node
    Explain {
        /// Node catalog (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        nodes: Option<PathBuf>,
        /// Node id
        node_id: String,
    },

    /// Show catalog and allocation statistics
    Summary {
        /// Node catalog (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        nodes: Option<PathBuf>,
    },

    /// Show realm and level for an experience value
    Progress {
        /// Cumulative experience
        #[arg(allow_negative_numbers = true)]
        experience: i64,
    },

    /// Migrate user progress to the current experience scale
    Migrate {
        /// Migration input (JSON with users and the old scale)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        input: PathBuf,
        /// Write migrated users here (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        /// Write the migration report here (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        report: Option<PathBuf>,
        /// Node catalog for orphaned-node detection
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        nodes: Option<PathBuf>,
        /// Compute and report only; no backup, no output
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore users from a migration backup
    Rollback {
        /// Migration id
        migration_id: String,
        /// User file to restore into (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },

    /// List stored migration backups
    Backups,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged settings
    Show,

    /// Create settings template
    Init {
        /// Create global settings
        #[arg(short, long)]
        global: bool,
    },

    /// Show settings paths
    Path,
}
