//! Self-update command and the two hidden handshake steps

use anyhow::{Context, Result};
use dialoguer::Confirm;
use mirrorsync_core::{RuntimeConfig, VersionOrdinal};
use mirrorsync_update::self_update::SelfUpdateSettings;
use mirrorsync_update::{Fetcher, SelfUpdateCoordinator, UpdateCheck, VERSION};
use tracing::warn;

use crate::cli::SelfUpdateArgs;
use crate::output;

pub async fn run(args: SelfUpdateArgs, config: &RuntimeConfig) -> Result<()> {
    let mut updater = SelfUpdateCoordinator::from_config(config, VERSION)
        .context("Self-update is not available")?;

    output::info(format!("Current version: {}", VERSION));

    let spinner = output::spinner("Checking for updates...");
    let check = updater.check().await;
    spinner.finish_and_clear();

    match check? {
        UpdateCheck::UpToDate { .. } => {
            output::success("Already on the latest version");
        }
        UpdateCheck::Available(info) => {
            output::success(format!("Update available: {}", info.version));
            if args.check {
                output::info("Run 'mirrorsync self-update' to install the update");
                return Ok(());
            }
            stage_and_relaunch(&mut updater, args.yes).await?;
        }
    }

    Ok(())
}

/// Offer an update before syncing
///
/// Returns `true` when the staged client was launched and this process
/// should exit without syncing.
pub async fn update_before_sync(config: &RuntimeConfig, yes: bool) -> Result<bool> {
    let mut updater = SelfUpdateCoordinator::from_config(config, VERSION)?;

    match updater.check().await? {
        UpdateCheck::UpToDate { .. } => Ok(false),
        UpdateCheck::Available(info) => {
            output::info(format!(
                "Client update available: {} -> {}",
                VERSION, info.version
            ));
            stage_and_relaunch(&mut updater, yes).await
        }
    }
}

async fn stage_and_relaunch(updater: &mut SelfUpdateCoordinator, yes: bool) -> Result<bool> {
    if !yes {
        let proceed = Confirm::new()
            .with_prompt("Install the update now?")
            .default(true)
            .interact()?;

        if !proceed {
            output::info("Update skipped");
            return Ok(false);
        }
    }

    let spinner = output::spinner("Downloading update...");
    let staged = updater.stage().await;
    spinner.finish_and_clear();
    let staged = staged.context("Failed to download update")?;

    output::success(format!("Update staged at {}", staged.display()));
    updater
        .relaunch()
        .context("Failed to start the staged client")?;
    output::info("Restarting to finish the update");

    Ok(true)
}

/// Runs as the staged copy: replace the original and hand over to it
pub async fn install(config: &RuntimeConfig) -> Result<()> {
    let mut updater = handshake_coordinator(config)?;
    updater
        .install()
        .await
        .context("Failed to install update")?;
    Ok(())
}

/// Runs as the freshly installed client: remove the staged copy
///
/// A failed cleanup leaves a stray file behind but does not stop the
/// command that follows.
pub async fn cleanup(config: &RuntimeConfig) -> Result<()> {
    let mut updater = handshake_coordinator(config)?;
    if let Err(e) = updater.cleanup().await {
        warn!(error = %e, "Self-update cleanup failed");
        output::warning(format!("Could not remove staged update: {}", e));
    } else {
        output::success(format!("Updated to {}", VERSION));
    }
    Ok(())
}

// The handshake steps never contact the endpoint, so they must work even
// when no address is configured.
fn handshake_coordinator(config: &RuntimeConfig) -> Result<SelfUpdateCoordinator> {
    let fetcher = Fetcher::new(&config.network)?;
    let executable = std::env::current_exe().context("Cannot locate running executable")?;

    Ok(SelfUpdateCoordinator::new(
        fetcher,
        config.self_update.address.clone().unwrap_or_default(),
        VersionOrdinal::parse(VERSION),
        executable,
        SelfUpdateSettings::from_config(config),
    ))
}
