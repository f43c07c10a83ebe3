//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// mirrorsync - keep a local tree in step with the best available mirror
#[derive(Parser, Debug)]
#[command(name = "mirrorsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Extra runtime config file layered above ~/.mirrorsync
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Install a staged self-update over the original executable
    #[arg(long, hide = true, conflicts_with = "cleanup_update")]
    pub update: bool,

    /// Remove the staged executable left by a self-update
    #[arg(long = "cleanup-update", hide = true)]
    pub cleanup_update: bool,

    /// Defaults to `sync` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring the destination in line with the best mirror
    Sync(SyncArgs),

    /// Show what a sync would download without downloading it
    Check(CheckArgs),

    /// Check for and stage a new client executable
    SelfUpdate(SelfUpdateArgs),

    /// Show version information
    Version(VersionArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Sync(SyncArgs::default())
    }
}

// Sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Mirror channel (default from config)
    #[arg(long)]
    pub channel: Option<String>,

    /// Destination directory
    #[arg(short, long, default_value = ".")]
    pub dest: Utf8PathBuf,

    /// Number of validation workers
    #[arg(long)]
    pub validate_workers: Option<usize>,

    /// Number of download workers
    #[arg(long)]
    pub download_workers: Option<usize>,

    /// Attempts per file before it is reported as failed
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Do not check for a client update first
    #[arg(long)]
    pub no_self_update: bool,
}

impl Default for SyncArgs {
    fn default() -> Self {
        Self {
            channel: None,
            dest: Utf8PathBuf::from("."),
            validate_workers: None,
            download_workers: None,
            max_attempts: None,
            yes: false,
            no_self_update: false,
        }
    }
}

// Check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Mirror channel (default from config)
    #[arg(long)]
    pub channel: Option<String>,

    /// Destination directory
    #[arg(short, long, default_value = ".")]
    pub dest: Utf8PathBuf,

    /// List every stale file
    #[arg(long)]
    pub list: bool,
}

// Self-update command
#[derive(Args, Debug)]
pub struct SelfUpdateArgs {
    /// Only check, do not download
    #[arg(long)]
    pub check: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved runtime configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
