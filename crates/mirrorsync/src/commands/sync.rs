//! Sync command

use anyhow::{anyhow, Result};
use mirrorsync_core::RuntimeConfig;
use mirrorsync_update::{CycleOutcome, SyncCycle, TransferSettings};
use tokio_util::sync::CancellationToken;

use crate::cli::SyncArgs;
use crate::commands::self_update;
use crate::output;

pub async fn run(args: SyncArgs, config: &RuntimeConfig) -> Result<()> {
    let self_update_configured =
        config.self_update.enabled && config.self_update.address.is_some();

    if self_update_configured && !args.no_self_update {
        match self_update::update_before_sync(config, args.yes).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => output::warning(format!("Self-update skipped: {:#}", e)),
        }
    }

    let channel = super::channel(args.channel.as_deref(), config);
    let cancel = CancellationToken::new();
    super::cancel_on_ctrl_c(cancel.clone());

    let cycle = SyncCycle::from_config(
        config,
        channel,
        args.dest.as_std_path(),
        transfer_settings(&args, config),
    )?
    .with_cancellation(cancel);

    output::info(format!(
        "Channel {} ({} mirrors)",
        channel,
        cycle.mirrors().len()
    ));

    let spinner = output::spinner("Selecting mirror...");
    let manifest = cycle.select_manifest().await;
    spinner.finish_and_clear();
    let manifest = manifest?;

    output::kv("Mirror", &manifest.source);
    output::kv("Version", manifest.version.as_str());

    let files = manifest.file_count();
    let pb = output::phase_bar(files, "Validating");
    let bar = pb.clone();
    cycle.on_progress(move || bar.inc(1));
    let stale = cycle.validate(&manifest).await;
    pb.finish_and_clear();
    let stale = stale?;

    if stale == 0 {
        output::success(format!("Already up to date ({} files)", files));
        return Ok(());
    }

    output::info(format!("{} of {} files need downloading", stale, files));

    let pb = output::phase_bar(stale, "Downloading");
    let bar = pb.clone();
    cycle.on_progress(move || bar.inc(1));
    let outcome = cycle.download(&manifest).await;
    pb.finish_and_clear();

    summarize(outcome?)
}

fn transfer_settings(args: &SyncArgs, config: &RuntimeConfig) -> TransferSettings {
    let mut settings = TransferSettings::from_config(config);

    if let Some(n) = args.validate_workers {
        settings.validate_workers = n.max(1);
    }
    if let Some(n) = args.download_workers {
        settings.download_workers = n.max(1);
    }
    if let Some(n) = args.max_attempts {
        settings.max_attempts = n.max(1);
    }

    settings
}

fn summarize(outcome: CycleOutcome) -> Result<()> {
    let (version, snapshot, failures) = match outcome {
        CycleOutcome::UpToDate { files, .. } => {
            output::success(format!("Already up to date ({} files)", files));
            return Ok(());
        }
        CycleOutcome::Synced {
            version,
            snapshot,
            failures,
        } => (version, snapshot, failures),
    };

    output::header("Sync summary");
    output::kv("Version", &version);
    output::kv("Checked", snapshot.validated);
    output::kv("Downloaded", snapshot.completed);
    output::kv("Failed", snapshot.failed);

    if failures.is_empty() {
        output::success(format!("Synced to version {}", version));
        return Ok(());
    }

    output::header("Failed files");
    for failure in &failures {
        output::error(format!(
            "{} after {} attempts: {}",
            failure.record.relative_path(),
            failure.attempts,
            failure.last_error
        ));
    }

    Err(anyhow!("{} file(s) failed to download", failures.len()))
}
