//! Configuration loading and management

mod hierarchical_loader;

pub use hierarchical_loader::{channel_addresses, HierarchicalConfigLoader};
