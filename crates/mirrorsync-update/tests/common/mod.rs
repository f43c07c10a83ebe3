//! Common test infrastructure for mirrorsync-update tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: Versions, routes and file contents
//! - `builders`: Fluent builder for manifest documents
//! - `mock_server`: Wiremock setup for manifests, files and the version endpoint
//! - `fixtures`: Local trees, gzip and engine settings
//! - `process_helpers`: Scripted process probe and recording launcher

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod constants;
pub mod fixtures;
pub mod mock_server;
pub mod process_helpers;

pub use builders::*;
pub use constants::*;
pub use fixtures::*;
pub use mock_server::*;
pub use process_helpers::*;
