//! Type definitions for mirrorsync runtime configuration

mod runtime_config;

pub use runtime_config::*;
