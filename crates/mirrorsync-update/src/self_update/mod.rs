//! Self-update handshake for the client executable
//!
//! The running client cannot overwrite its own image, so an update is
//! handed between two processes:
//!
//! 1. The running client checks the version endpoint, downloads the new
//!    binary beside itself as `_<name>` and launches it with `--update`,
//!    then exits.
//! 2. The staged process waits for the original to exit, copies itself over
//!    the original and launches it with `--cleanup-update`.
//! 3. The installed client waits for the staged process to exit, deletes
//!    `_<name>` and its log, and carries on normally.
//!
//! No step ever writes to the path of the executable that is running it.

mod process;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mirrorsync_core::retry::{ClosurePredicate, RetryError, RetryExecutor, TracingObserver};
use mirrorsync_core::types::{RetryPolicy, RuntimeConfig};
use mirrorsync_core::VersionOrdinal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FetchError, SelfUpdateError, SyncError};
use crate::fetch::Fetcher;

pub use process::{
    CommandLauncher, FsImageReplacer, ImageReplacer, Launcher, ProcessProbe, SystemProcessProbe,
};

/// Argument that starts the install half of the handshake
pub const UPDATE_FLAG: &str = "--update";

/// Argument that starts the cleanup half of the handshake
pub const CLEANUP_FLAG: &str = "--cleanup-update";

type StepResult<T> = std::result::Result<T, SelfUpdateError>;

/// Where the handshake currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateState {
    Checking,
    UpToDate,
    UpdateAvailable,
    Downloading,
    Staged,
    Relaunching,
    Installing,
    CleaningUp,
    Done,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateState::Checking => "checking",
            UpdateState::UpToDate => "up-to-date",
            UpdateState::UpdateAvailable => "update-available",
            UpdateState::Downloading => "downloading",
            UpdateState::Staged => "staged",
            UpdateState::Relaunching => "relaunching",
            UpdateState::Installing => "installing",
            UpdateState::CleaningUp => "cleaning-up",
            UpdateState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Document served by the version endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: VersionOrdinal,

    /// Download URL of the new executable
    pub address: String,

    /// SHA-1 of the executable, checked before it is staged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Outcome of [`SelfUpdateCoordinator::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    UpToDate { version: VersionOrdinal },
    Available(VersionInfo),
}

/// Timing and naming for the handshake
#[derive(Debug, Clone)]
pub struct SelfUpdateSettings {
    /// Prefix of the staged executable's file name
    pub staging_prefix: String,

    /// Interval between process-list polls
    pub poll_interval: Duration,

    /// Give up waiting for the other process after this long
    pub wait_timeout: Duration,

    /// Retries for downloading the new executable
    pub retry_policy: RetryPolicy,
}

impl SelfUpdateSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            staging_prefix: config.self_update.staging_prefix.clone(),
            poll_interval: Duration::from_millis(config.self_update.poll_interval_ms),
            wait_timeout: Duration::from_secs(config.self_update.wait_timeout_secs),
            retry_policy: config.retry_policy("self-update"),
        }
    }
}

impl Default for SelfUpdateSettings {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

/// Drives the self-update state machine
pub struct SelfUpdateCoordinator {
    fetcher: Fetcher,
    endpoint: String,
    current_version: VersionOrdinal,
    executable: PathBuf,
    settings: SelfUpdateSettings,
    probe: Arc<dyn ProcessProbe>,
    replacer: Arc<dyn ImageReplacer>,
    launcher: Arc<dyn Launcher>,
    state: UpdateState,
    available: Option<VersionInfo>,
}

impl SelfUpdateCoordinator {
    /// Create a coordinator using the real process table, filesystem and
    /// process spawning
    pub fn new(
        fetcher: Fetcher,
        endpoint: impl Into<String>,
        current_version: VersionOrdinal,
        executable: impl Into<PathBuf>,
        settings: SelfUpdateSettings,
    ) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            current_version,
            executable: executable.into(),
            settings,
            probe: Arc::new(SystemProcessProbe),
            replacer: Arc::new(FsImageReplacer),
            launcher: Arc::new(CommandLauncher),
            state: UpdateState::Checking,
            available: None,
        }
    }

    /// Build from runtime config for the running executable
    pub fn from_config(config: &RuntimeConfig, current_version: &str) -> crate::Result<Self> {
        let endpoint = config
            .self_update
            .address
            .clone()
            .ok_or(SelfUpdateError::NotConfigured)?;
        let fetcher = Fetcher::new(&config.network)?;
        let executable = std::env::current_exe().map_err(SyncError::Io)?;

        Ok(Self::new(
            fetcher,
            endpoint,
            VersionOrdinal::parse(current_version),
            executable,
            SelfUpdateSettings::from_config(config),
        ))
    }

    pub fn with_probe(mut self, probe: impl ProcessProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_replacer(mut self, replacer: impl ImageReplacer + 'static) -> Self {
        self.replacer = Arc::new(replacer);
        self
    }

    pub fn with_launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn current_version(&self) -> &VersionOrdinal {
        &self.current_version
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Version information from the last successful check
    pub fn available(&self) -> Option<&VersionInfo> {
        self.available.as_ref()
    }

    /// Path of the staged copy of the running executable
    pub fn staged_path(&self) -> StepResult<PathBuf> {
        let name = self.file_name(&self.executable)?;
        Ok(self
            .executable
            .with_file_name(format!("{}{}", self.settings.staging_prefix, name)))
    }

    /// Path of the original executable, when running as the staged copy
    pub fn original_path(&self) -> StepResult<PathBuf> {
        let name = self.file_name(&self.executable)?;
        let original = name
            .strip_prefix(&self.settings.staging_prefix)
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| SelfUpdateError::InvalidExecutable {
                path: self.executable.clone(),
            })?;
        Ok(self.executable.with_file_name(original))
    }

    /// Ask the version endpoint whether a different client is published
    ///
    /// Any version other than the running one counts as an update, so the
    /// endpoint can roll clients back as well as forward.
    pub async fn check(&mut self) -> StepResult<UpdateCheck> {
        self.state = UpdateState::Checking;
        self.available = None;

        let info: VersionInfo = self
            .fetcher
            .get_json(&self.endpoint)
            .await
            .map_err(|source| SelfUpdateError::Check {
                address: self.endpoint.clone(),
                source,
            })?;

        if info.version == self.current_version {
            info!(version = %self.current_version, "Client is up to date");
            self.state = UpdateState::UpToDate;
            return Ok(UpdateCheck::UpToDate {
                version: info.version,
            });
        }

        info!(
            current = %self.current_version,
            available = %info.version,
            "Client update available"
        );
        self.state = UpdateState::UpdateAvailable;
        self.available = Some(info.clone());
        Ok(UpdateCheck::Available(info))
    }

    /// Download the new executable beside the running one
    pub async fn stage(&mut self) -> StepResult<PathBuf> {
        self.expect_state(UpdateState::UpdateAvailable, "stage an update")?;
        let info = self.available.clone().ok_or(SelfUpdateError::InvalidState {
            action: "stage an update",
            state: self.state.to_string(),
        })?;

        let staged = self.staged_path()?;
        self.guard_running_image(&staged)?;
        self.state = UpdateState::Downloading;

        let executor = RetryExecutor::new(self.settings.retry_policy.clone())
            .with_observer(TracingObserver::new("self-update"))
            .with_predicate(ClosurePredicate::new(|e: &FetchError| {
                !matches!(e.status(), Some(status) if (400..500).contains(&status))
            }));

        let fetched = executor
            .execute(|| {
                self.fetcher
                    .download_to(&info.address, info.hash.as_deref(), &staged)
            })
            .await;

        if let Err(err) = fetched {
            self.state = UpdateState::UpdateAvailable;
            return Err(self.download_failure(&info, &staged, err));
        }
        make_executable(&staged)?;

        info!(path = ?staged, version = %info.version, "Update staged");
        self.state = UpdateState::Staged;
        Ok(staged)
    }

    /// Launch the staged executable in install mode
    ///
    /// The caller should exit once this returns `Ok`.
    pub fn relaunch(&mut self) -> StepResult<()> {
        self.expect_state(UpdateState::Staged, "relaunch")?;
        let staged = self.staged_path()?;
        self.state = UpdateState::Relaunching;

        self.launcher
            .launch(&staged, &[UPDATE_FLAG])
            .map_err(|source| SelfUpdateError::Launch {
                path: staged.clone(),
                source,
            })?;

        info!(path = ?staged, "Relaunched into staged update");
        Ok(())
    }

    /// Install half, run by the staged executable
    ///
    /// Waits for the original to exit, copies this executable over it and
    /// launches it in cleanup mode.
    pub async fn install(&mut self) -> StepResult<()> {
        self.state = UpdateState::Installing;

        let original = self.original_path()?;
        self.guard_running_image(&original)?;

        let original_name = self.file_name(&original)?;
        self.wait_for_exit(&original_name).await?;

        self.replacer
            .replace(&self.executable, &original)
            .map_err(|source| SelfUpdateError::Io {
                path: original.clone(),
                source,
            })?;
        info!(path = ?original, "Update installed");

        self.launcher
            .launch(&original, &[CLEANUP_FLAG])
            .map_err(|source| SelfUpdateError::Launch {
                path: original.clone(),
                source,
            })?;

        Ok(())
    }

    /// Cleanup half, run by the freshly installed executable
    ///
    /// Waits for the staged process to exit, then deletes the staged
    /// executable and its log.
    pub async fn cleanup(&mut self) -> StepResult<()> {
        self.state = UpdateState::CleaningUp;

        let staged = self.staged_path()?;
        self.guard_running_image(&staged)?;

        let staged_name = self.file_name(&staged)?;
        self.wait_for_exit(&staged_name).await?;

        for path in [staged.clone(), log_path(&staged)] {
            self.replacer
                .remove(&path)
                .map_err(|source| SelfUpdateError::Io {
                    path: path.clone(),
                    source,
                })?;
            debug!(path = ?path, "Removed");
        }

        info!("Self-update cleanup complete");
        self.state = UpdateState::Done;
        Ok(())
    }

    async fn wait_for_exit(&self, name: &str) -> StepResult<()> {
        let deadline = Instant::now() + self.settings.wait_timeout;

        loop {
            if !self.probe.is_running(name) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SelfUpdateError::WaitTimeout {
                    process: name.to_string(),
                });
            }
            debug!(process = name, "Waiting for process to exit");
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    fn download_failure(
        &self,
        info: &VersionInfo,
        staged: &Path,
        err: RetryError<FetchError>,
    ) -> SelfUpdateError {
        if let Err(e) = self.replacer.remove(staged) {
            warn!(path = ?staged, error = %e, "Could not remove staged file");
        }

        match err.into_source() {
            Some(FetchError::Verification {
                expected, actual, ..
            }) => SelfUpdateError::Verification { expected, actual },
            Some(source) => SelfUpdateError::Download {
                address: info.address.clone(),
                reason: source.to_string(),
            },
            None => SelfUpdateError::Download {
                address: info.address.clone(),
                reason: "no download attempts allowed".to_string(),
            },
        }
    }

    fn expect_state(&self, expected: UpdateState, action: &'static str) -> StepResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SelfUpdateError::InvalidState {
                action,
                state: self.state.to_string(),
            })
        }
    }

    fn guard_running_image(&self, target: &Path) -> StepResult<()> {
        if target == self.executable {
            return Err(SelfUpdateError::RunningImage {
                path: target.to_path_buf(),
            });
        }
        Ok(())
    }

    fn file_name(&self, path: &Path) -> StepResult<String> {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| SelfUpdateError::InvalidExecutable {
                path: path.to_path_buf(),
            })
    }
}

/// Log file written beside an executable, `<stem>.log`
pub fn log_path(executable: &Path) -> PathBuf {
    executable.with_extension("log")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> StepResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|source| {
        SelfUpdateError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> StepResult<()> {
    Ok(())
}
