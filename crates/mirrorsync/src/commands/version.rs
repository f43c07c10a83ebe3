//! Version command
//!
//! Reports the client version together with where it gets content and
//! updates from, since those decide what `sync` and `self-update` compare
//! the version against.

use anyhow::Result;
use mirrorsync_core::{RuntimeConfig, VersionOrdinal};
use mirrorsync_update::VERSION;
use serde::Serialize;

use crate::cli::VersionArgs;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct VersionReport {
    version: VersionOrdinal,
    commit: Option<&'static str>,
    target: Option<&'static str>,
    channel: String,
    mirrors: usize,
    self_update: Option<String>,
}

impl VersionReport {
    fn new(config: &RuntimeConfig) -> Self {
        let channel = config.mirrors.default_channel.clone();
        let mirrors = config
            .mirrors
            .channels
            .get(&channel)
            .map_or(0, Vec::len);

        Self {
            version: VersionOrdinal::parse(VERSION),
            commit: option_env!("GIT_SHA"),
            target: option_env!("TARGET"),
            channel,
            mirrors,
            self_update: config
                .self_update
                .address
                .clone()
                .filter(|_| config.self_update.enabled),
        }
    }

    fn headline(&self) -> String {
        match self.commit {
            Some(commit) => format!("mirrorsync {} ({})", self.version, commit),
            None => format!("mirrorsync {}", self.version),
        }
    }
}

pub fn run(args: VersionArgs, config: &RuntimeConfig) -> Result<()> {
    let report = VersionReport::new(config);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.headline());
    if let Some(target) = report.target {
        output::kv("Target", target);
    }
    output::kv(
        "Channel",
        format!("{} ({} mirrors)", report.channel, report.mirrors),
    );
    output::kv(
        "Self-update",
        report.self_update.as_deref().unwrap_or("disabled"),
    );

    Ok(())
}
