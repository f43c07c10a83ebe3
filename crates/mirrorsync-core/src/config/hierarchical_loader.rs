//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Runtime config (~/.mirrorsync/mirrorsync-runtime.yaml)
//! 3. An explicit file passed with `--config`
//! 4. Environment variables (MIRRORSYNC_* prefix)
//! 5. CLI flags (handled by caller)
//!
//! Layers are merged as YAML documents before deserializing, so a user file
//! that only names one channel keeps every other embedded default.

use crate::error::{Error, Result};
use crate::types::RuntimeConfig;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde_yaml_ng::{Mapping, Value};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const RUNTIME_DEFAULTS: &str = "runtime-defaults.yaml";
const RUNTIME_FILE: &str = "mirrorsync-runtime.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,

    /// Extra file layered above the runtime config
    explicit_file: Option<Utf8PathBuf>,
}

impl HierarchicalConfigLoader {
    /// Create a new hierarchical config loader rooted at ~/.mirrorsync
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self {
            config_dir,
            explicit_file: None,
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir,
            explicit_file: None,
        }
    }

    /// Layer an explicit config file above the runtime config
    pub fn with_file(mut self, path: Utf8PathBuf) -> Self {
        self.explicit_file = Some(path);
        self
    }

    /// `~/.mirrorsync`, with `HOME` taking priority over the platform lookup
    fn get_config_dir() -> Result<Utf8PathBuf> {
        let home = env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;

        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Home directory is not UTF-8: {:?}", p)))?;

        Ok(home.join(".mirrorsync"))
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let mut merged = Self::load_embedded_value(RUNTIME_DEFAULTS)?;

        let runtime_config_path = self.config_dir.join(RUNTIME_FILE);
        if runtime_config_path.exists() {
            debug!("Layering runtime config from {}", runtime_config_path);
            merge_values(&mut merged, self.load_yaml_value(&runtime_config_path)?);
        }

        if let Some(explicit) = &self.explicit_file {
            if !explicit.exists() {
                return Err(Error::config_not_found(explicit.as_str()));
            }
            debug!("Layering explicit config from {}", explicit);
            merge_values(&mut merged, self.load_yaml_value(explicit)?);
        }

        let config: RuntimeConfig =
            serde_yaml_ng::from_value(merged).map_err(|e| Error::yaml("merged", e))?;

        let config = self.apply_env_overrides(config)?;
        Self::validate(&config)?;

        Ok(config)
    }

    /// Load an embedded configuration file as a YAML value
    fn load_embedded_value(filename: &str) -> Result<Value> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| Error::yaml(format!("embedded {}", filename), e))
    }

    /// Load a YAML file as a value
    fn load_yaml_value(&self, path: &Utf8Path) -> Result<Value> {
        let content = fs::read_to_string(path)?;
        let value: Value =
            serde_yaml_ng::from_str(&content).map_err(|e| Error::yaml(path.as_str(), e))?;
        // An empty file parses to null; treat it as "no overrides".
        if value.is_null() {
            return Ok(Value::Mapping(Mapping::new()));
        }
        Ok(value)
    }

    /// Apply environment variable overrides to runtime config
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Ok(val) = env::var("MIRRORSYNC_HTTP_TIMEOUT_SECS") {
            config.network.http_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("MIRRORSYNC_HTTP_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("MIRRORSYNC_DOWNLOAD_TIMEOUT_SECS") {
            config.network.download_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("MIRRORSYNC_DOWNLOAD_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("MIRRORSYNC_CHANNEL") {
            config.mirrors.default_channel = val;
        }

        if let Ok(val) = env::var("MIRRORSYNC_MAX_ATTEMPTS") {
            config.transfer.max_attempts = val.parse().map_err(|_| {
                Error::invalid_config("MIRRORSYNC_MAX_ATTEMPTS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("MIRRORSYNC_VALIDATE_WORKERS") {
            config.transfer.validate_workers = val.parse().map_err(|_| {
                Error::invalid_config("MIRRORSYNC_VALIDATE_WORKERS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("MIRRORSYNC_DOWNLOAD_WORKERS") {
            config.transfer.download_workers = val.parse().map_err(|_| {
                Error::invalid_config("MIRRORSYNC_DOWNLOAD_WORKERS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("MIRRORSYNC_SELF_UPDATE_ADDRESS") {
            config.self_update.address = Some(val);
        }

        if let Ok(val) = env::var("MIRRORSYNC_VERBOSE") {
            config.display.verbose = val.parse().unwrap_or(false);
        }

        if let Ok(val) = env::var("MIRRORSYNC_NO_COLOR") {
            config.display.color_enabled = !val.parse().unwrap_or(false);
        }

        Ok(config)
    }

    /// Reject configurations the sync engine cannot run with
    pub fn validate(config: &RuntimeConfig) -> Result<()> {
        if config.transfer.validate_workers == 0 || config.transfer.download_workers == 0 {
            return Err(Error::invalid_config("worker counts must be at least 1"));
        }

        if config.transfer.max_attempts == 0 {
            return Err(Error::invalid_config("max-attempts must be at least 1"));
        }

        for (channel, addresses) in &config.mirrors.channels {
            for address in addresses {
                check_url(address).map_err(|e| match e {
                    Error::InvalidUrl { url, reason } => {
                        Error::invalid_url(url, format!("{} (channel '{}')", reason, channel))
                    }
                    other => other,
                })?;
            }
        }

        if let Some(address) = &config.self_update.address {
            check_url(address)?;
        }

        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

/// Resolve the manifest addresses of a channel
pub fn channel_addresses<'a>(config: &'a RuntimeConfig, channel: &str) -> Result<&'a [String]> {
    config
        .mirrors
        .channels
        .get(channel)
        .map(Vec::as_slice)
        .ok_or_else(|| Error::unknown_channel(channel, config.mirrors.channels.keys()))
}

fn check_url(address: &str) -> Result<()> {
    let parsed = url::Url::parse(address).map_err(|e| Error::invalid_url(address, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::invalid_url(
            address,
            format!("unsupported scheme '{}'", other),
        )),
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
