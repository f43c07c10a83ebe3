//! One full sync pass: arbitrate, validate, download

use std::path::PathBuf;
use std::sync::Arc;

use mirrorsync_core::config::channel_addresses;
use mirrorsync_core::types::RuntimeConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::arbiter::MirrorArbiter;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::manifest::{FileRecord, Manifest};
use crate::report::{FailureRecord, ReportSnapshot, TransferReport};
use crate::transfer::{TransferEngine, TransferSettings};
use crate::validate::ValidationEngine;

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Validation found nothing stale; no download was started
    UpToDate { version: String, files: usize },

    /// Stale files were downloaded, some possibly failing
    Synced {
        version: String,
        snapshot: ReportSnapshot,
        failures: Vec<FailureRecord>,
    },
}

impl CycleOutcome {
    /// True unless a file failed
    pub fn is_success(&self) -> bool {
        match self {
            CycleOutcome::UpToDate { .. } => true,
            CycleOutcome::Synced { failures, .. } => failures.is_empty(),
        }
    }
}

/// What a cycle would download, without downloading it
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub version: String,
    pub source: String,
    pub files: usize,
    pub stale: Vec<FileRecord>,
}

impl SyncPlan {
    /// Sum of the manifest size hints of stale files
    pub fn known_bytes(&self) -> u64 {
        self.stale.iter().filter_map(|r| r.size).sum()
    }

    /// Stale files without a size hint
    pub fn unknown_sizes(&self) -> usize {
        self.stale.iter().filter(|r| r.size.is_none()).count()
    }
}

/// Wires the arbiter and transfer engine together for one channel and
/// destination
pub struct SyncCycle {
    mirrors: Vec<String>,
    arbiter: MirrorArbiter,
    engine: TransferEngine,
}

impl SyncCycle {
    pub fn new(
        mirrors: Vec<String>,
        fetcher: Fetcher,
        destination: impl Into<PathBuf>,
        settings: TransferSettings,
    ) -> Self {
        let validator = ValidationEngine::new(destination);
        Self {
            mirrors,
            arbiter: MirrorArbiter::new(fetcher.clone()),
            engine: TransferEngine::new(fetcher, validator, settings),
        }
    }

    /// Build a cycle for `channel` from runtime config
    pub fn from_config(
        config: &RuntimeConfig,
        channel: &str,
        destination: impl Into<PathBuf>,
        settings: TransferSettings,
    ) -> Result<Self> {
        let mirrors = channel_addresses(config, channel)?.to_vec();
        let fetcher = Fetcher::new(&config.network)?;
        Ok(Self::new(mirrors, fetcher, destination, settings))
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.engine = self.engine.with_cancellation(token);
        self
    }

    /// Install a callback run after every validated or downloaded file
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.engine.set_callback(callback);
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    pub fn report(&self) -> Arc<TransferReport> {
        self.engine.report()
    }

    /// Probe every mirror and return the winning manifest
    pub async fn select_manifest(&self) -> Result<Manifest> {
        self.arbiter.select_best(&self.mirrors).await
    }

    /// Validate the local tree against `manifest`
    ///
    /// Returns the number of stale files now waiting on the download queue.
    pub async fn validate(&self, manifest: &Manifest) -> Result<usize> {
        let queued = self.engine.build_queue(manifest);
        info!(
            files = queued,
            destination = ?self.engine.destination(),
            "Validating local files"
        );
        self.engine.validate_all().await?;
        Ok(self.engine.pending_downloads())
    }

    /// Download everything validation queued for `manifest`
    pub async fn download(&self, manifest: &Manifest) -> Result<CycleOutcome> {
        let version = manifest.version.to_string();
        info!(
            version = %version,
            stale = self.engine.pending_downloads(),
            "Downloading stale files"
        );
        self.engine.download_all().await?;

        let report = self.engine.report();
        let snapshot = report.snapshot();
        info!(
            completed = snapshot.completed,
            failed = snapshot.failed,
            "Sync finished"
        );

        Ok(CycleOutcome::Synced {
            version,
            snapshot,
            failures: report.failures(),
        })
    }

    /// Arbitrate and validate, then hand back the stale records
    pub async fn plan(&self) -> Result<SyncPlan> {
        let manifest = self.select_manifest().await?;
        self.validate(&manifest).await?;

        Ok(SyncPlan {
            version: manifest.version.to_string(),
            source: manifest.source.clone(),
            files: manifest.file_count(),
            stale: self.engine.take_downloads().await,
        })
    }

    /// Run the whole cycle
    pub async fn run(&self) -> Result<CycleOutcome> {
        let manifest = self.select_manifest().await?;

        if self.validate(&manifest).await? == 0 {
            info!(version = %manifest.version, "Already up to date");
            return Ok(CycleOutcome::UpToDate {
                version: manifest.version.to_string(),
                files: manifest.file_count(),
            });
        }

        self.download(&manifest).await
    }
}
