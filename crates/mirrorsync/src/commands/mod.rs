//! CLI command implementations

pub mod check;
pub mod config;
pub mod self_update;
pub mod sync;
pub mod version;

use mirrorsync_core::RuntimeConfig;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Channel named on the command line, else the configured default
fn channel<'a>(requested: Option<&'a str>, config: &'a RuntimeConfig) -> &'a str {
    requested.unwrap_or(&config.mirrors.default_channel)
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping workers");
            token.cancel();
        }
    });
}
