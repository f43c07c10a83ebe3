//! Check command

use anyhow::Result;
use mirrorsync_core::RuntimeConfig;
use mirrorsync_update::{SyncCycle, SyncPlan, TransferSettings};
use tokio_util::sync::CancellationToken;

use crate::cli::CheckArgs;
use crate::output;

pub async fn run(args: CheckArgs, config: &RuntimeConfig) -> Result<()> {
    let channel = super::channel(args.channel.as_deref(), config);
    let cancel = CancellationToken::new();
    super::cancel_on_ctrl_c(cancel.clone());

    let cycle = SyncCycle::from_config(
        config,
        channel,
        args.dest.as_std_path(),
        TransferSettings::from_config(config),
    )?
    .with_cancellation(cancel);

    let spinner = output::spinner("Checking mirrors and local files...");
    let plan = cycle.plan().await;
    spinner.finish_and_clear();
    let plan = plan?;

    output::header("Sync check");
    output::kv("Channel", channel);
    output::kv("Mirror", &plan.source);
    output::kv("Version", &plan.version);
    output::kv("Files", plan.files);
    output::kv("Stale", plan.stale.len());

    if plan.stale.is_empty() {
        output::success("Already up to date");
        return Ok(());
    }

    output::kv("Download size", download_size(&plan));

    if args.list {
        output::header("Stale files");
        for record in &plan.stale {
            println!("  {}", record.relative_path());
        }
    }

    output::info("Run 'mirrorsync sync' to download");
    Ok(())
}

fn download_size(plan: &SyncPlan) -> String {
    let known = output::bytes(plan.known_bytes());
    match plan.unknown_sizes() {
        0 => known,
        n => format!("{} (+{} files of unknown size)", known, n),
    }
}
