//! Content synchronization for mirrorsync
//!
//! Provides:
//! - Manifest decoding and flattening into per-file records
//! - Concurrent mirror arbitration by version and latency
//! - SHA-1 validation of the local tree
//! - Bounded validate and download worker pools with retry
//! - Gzip-aware, hash-verified, atomic file installation
//! - The self-update handshake for the client executable

pub mod arbiter;
pub mod cycle;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod report;
pub mod self_update;
pub mod transfer;
pub mod validate;

pub use arbiter::MirrorArbiter;
pub use cycle::{CycleOutcome, SyncCycle, SyncPlan};
pub use error::{FetchError, ManifestError, Result, SelfUpdateError, SyncError};
pub use fetch::Fetcher;
pub use manifest::{FileRecord, Manifest, ManifestNode, ManifestTree};
pub use report::{CompletedRecord, FailureRecord, ReportSnapshot, TransferReport};
pub use self_update::{SelfUpdateCoordinator, UpdateCheck, UpdateState, VersionInfo};
pub use transfer::{PoolHandle, ProgressCallback, TransferEngine, TransferSettings};
pub use validate::ValidationEngine;

/// Current client version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
