//! # mirrorsync-core
//!
//! Core library for mirrorsync providing:
//! - Runtime configuration with hierarchical precedence
//! - Dotted version ordering used to arbitrate manifests and self-updates
//! - Retry execution engine with policy-based configuration

pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod version;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use types::RuntimeConfig;
pub use version::VersionOrdinal;
