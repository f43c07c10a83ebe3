//! mirrorsync CLI - keeps a local tree in step with the best mirror
//!
//! This is the main entry point for the mirrorsync command-line interface.

mod cli;
mod commands;
mod output;

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use mirrorsync_core::{HierarchicalConfigLoader, RuntimeConfig};
use mirrorsync_update::self_update::log_path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS operation
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_tracing(cli.verbose, cli.quiet, config.display.verbose);
    output::set_quiet(cli.quiet);

    if !config.display.color_enabled {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Install half of the self-update handshake: this process is the staged
    // copy and exits as soon as the original has been replaced.
    if cli.update {
        return commands::self_update::install(&config).await;
    }

    if cli.cleanup_update {
        commands::self_update::cleanup(&config).await?;
    }

    match cli.command.unwrap_or_default() {
        Commands::Sync(args) => commands::sync::run(args, &config).await,
        Commands::Check(args) => commands::check::run(args, &config).await,
        Commands::SelfUpdate(args) => commands::self_update::run(args, &config).await,
        Commands::Version(args) => commands::version::run(args, &config),
        Commands::Config(args) => commands::config::run(args, &config),
    }
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut loader = HierarchicalConfigLoader::new().context("Failed to locate config directory")?;
    if let Some(path) = &cli.config {
        loader = loader.with_file(path.clone());
    }
    loader
        .load_runtime_config()
        .context("Failed to load runtime configuration")
}

/// Initialize tracing with appropriate verbosity
///
/// Besides the terminal, everything is appended to `<executable>.log` beside
/// the running binary.
fn init_tracing(verbose: u8, quiet: bool, config_verbose: bool) {
    let level = if quiet {
        "error"
    } else {
        match (verbose, config_verbose) {
            (0, false) => "info",
            (0, true) | (1, _) => "debug",
            _ => "trace",
        }
    };

    let file_layer = open_log_file().map(|file| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .with(EnvFilter::new(level))
        .init();
}

fn open_log_file() -> Option<File> {
    let exe = std::env::current_exe().ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path(&exe))
        .ok()
}
