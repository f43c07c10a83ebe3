//! Error types for mirrorsync-update
//!
//! Per-file and per-mirror failures ([`FetchError`], [`ManifestError`]) are
//! recovered inside the engine. Only [`SyncError`] escapes to the caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using mirrorsync-update's top-level error
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that end a sync cycle or a self-update step
#[derive(Error, Debug)]
pub enum SyncError {
    /// Every mirror failed to provide a usable manifest
    #[error("No manifest available: all {attempted} mirror(s) failed")]
    NoManifestAvailable { attempted: usize },

    /// A file used up all of its download attempts
    #[error("Giving up on {path} after {attempts} attempts: {last_error}")]
    MaxAttemptsExceeded {
        path: String,
        attempts: u32,
        last_error: String,
    },

    /// The cycle was cancelled before its queues drained
    #[error("Sync cancelled")]
    Cancelled,

    /// Self-update failure
    #[error(transparent)]
    SelfUpdate(#[from] SelfUpdateError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] mirrorsync_core::Error),

    /// HTTP client construction or request failure outside a worker
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Create a no manifest available error
    pub fn no_manifest_available(attempted: usize) -> Self {
        Self::NoManifestAvailable { attempted }
    }
}

/// A manifest document that decoded as JSON but does not describe a file tree
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Invalid JSON or missing top-level fields
    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Structurally wrong node
    #[error("Malformed manifest at '{location}': {message}")]
    Malformed { location: String, message: String },

    /// Two leaves resolve to the same destination file
    #[error("Duplicate destination path in manifest: {path}")]
    DuplicatePath { path: String },
}

impl ManifestError {
    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Failure fetching a manifest, a version document or a file
#[derive(Error, Debug)]
pub enum FetchError {
    /// Could not build the HTTP client
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection, timeout or body read failure
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Manifest body could not be decoded
    #[error("Manifest from {url} is invalid: {source}")]
    Manifest {
        url: String,
        #[source]
        source: ManifestError,
    },

    /// JSON document other than a manifest could not be decoded
    #[error("Invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Gzip stream was corrupt
    #[error("Failed to decompress {url}: {source}")]
    Decompress {
        url: String,
        #[source]
        source: io::Error,
    },

    /// Downloaded content does not hash to the expected value
    #[error("Hash mismatch for {url}: expected {expected}, got {actual}")]
    Verification {
        url: String,
        expected: String,
        actual: String,
    },

    /// Writing the verified content failed
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// True for a hash mismatch
    pub fn is_verification(&self) -> bool {
        matches!(self, FetchError::Verification { .. })
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Self-update handshake failures
#[derive(Error, Debug)]
pub enum SelfUpdateError {
    /// No version endpoint configured
    #[error("Self-update endpoint is not configured")]
    NotConfigured,

    /// The version endpoint was unreachable or returned garbage
    #[error("Self-update check against {address} failed: {source}")]
    Check {
        address: String,
        #[source]
        source: FetchError,
    },

    /// Downloading the new binary failed after all retries
    #[error("Failed to download update from {address}: {reason}")]
    Download { address: String, reason: String },

    /// The downloaded binary does not match the published hash
    #[error("Downloaded update failed verification: expected {expected}, got {actual}")]
    Verification { expected: String, actual: String },

    /// A step would have written over the executable that is running
    #[error("Refusing to overwrite running executable {}", path.display())]
    RunningImage { path: PathBuf },

    /// The executable path has no usable file name
    #[error("Cannot derive update paths from executable {}", path.display())]
    InvalidExecutable { path: PathBuf },

    /// The other half of the handshake never exited
    #[error("Timed out waiting for process '{process}' to exit")]
    WaitTimeout { process: String },

    /// A step was invoked out of order
    #[error("Cannot {action} while in state {state}")]
    InvalidState { action: &'static str, state: String },

    /// Spawning the next process failed
    #[error("Failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Replacing or removing a file failed
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
