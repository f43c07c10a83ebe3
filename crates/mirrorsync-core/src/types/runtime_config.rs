//! Runtime configuration, as read from `mirrorsync-runtime.yaml`
//!
//! Every section and field is optional in a user file; anything left out
//! falls back to the embedded defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Merged runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    /// Mirror channels and their manifest addresses
    #[serde(default)]
    pub mirrors: MirrorsConfig,

    /// Worker pool sizing and attempt limits
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Delay schedules, keyed by operation (`download`, `self-update`)
    #[serde(default)]
    pub retry_policies: RetryPoliciesConfig,

    /// Self-update endpoint and handshake timing
    #[serde(default)]
    pub self_update: SelfUpdateConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

impl RuntimeConfig {
    /// Retry policy for a named operation, falling back to the default policy
    pub fn retry_policy(&self, operation: &str) -> RetryPolicy {
        self.retry_policies
            .operations
            .get(operation)
            .cloned()
            .unwrap_or_else(|| self.retry_policies.default.clone())
    }
}

/// HTTP timeouts shared by manifest, file and version requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Timeout for manifest and version endpoint requests, in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout for a single file download, in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}
fn default_download_timeout() -> u64 {
    300 // 5 minutes
}
fn default_user_agent() -> String {
    format!(
        "mirrorsync/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Mirror channels
///
/// Each channel lists the manifest URLs of the mirrors that serve it. The
/// arbiter races every URL of the selected channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MirrorsConfig {
    /// Channel used when none is given on the command line
    #[serde(default = "default_channel")]
    pub default_channel: String,

    /// Channel name to manifest URLs
    #[serde(default)]
    pub channels: BTreeMap<String, Vec<String>>,
}

impl Default for MirrorsConfig {
    fn default() -> Self {
        Self {
            default_channel: default_channel(),
            channels: BTreeMap::new(),
        }
    }
}

fn default_channel() -> String {
    "master".to_string()
}

/// Worker pool sizing and attempt limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransferConfig {
    /// Number of concurrent local hash checks
    #[serde(default = "default_validate_workers")]
    pub validate_workers: usize,

    /// Number of concurrent file downloads
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// Attempts per file before it is recorded as failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            validate_workers: default_validate_workers(),
            download_workers: default_download_workers(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_validate_workers() -> usize {
    8
}
fn default_download_workers() -> usize {
    2
}

/// Named retry policies with a fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Default retry policy
    #[serde(default)]
    pub default: RetryPolicy,

    /// Per-operation retry policies
    #[serde(default)]
    pub operations: HashMap<String, RetryPolicy>,
}

impl Default for RetryPoliciesConfig {
    fn default() -> Self {
        let mut operations = HashMap::new();

        operations.insert(
            "download".to_string(),
            RetryPolicy {
                max_attempts: 3,
                strategy: RetryStrategy::ExponentialBackoff,
                backoff_multiplier: 2.0,
                initial_delay_ms: 500,
                max_delay_ms: 8000,
            },
        );
        operations.insert(
            "self-update".to_string(),
            RetryPolicy {
                max_attempts: 3,
                strategy: RetryStrategy::FixedDelay,
                backoff_multiplier: 1.0,
                initial_delay_ms: 1000,
                max_delay_ms: 1000,
            },
        );

        Self {
            default: RetryPolicy::default(),
            operations,
        }
    }
}

/// Attempt limit and delay schedule for one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that retries immediately, with no delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::None,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Retry immediately
    None,

    /// Fixed delay between retries
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}

/// Where to look for a newer client, and how long the handshake waits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelfUpdateConfig {
    /// Check for a newer client before each sync
    #[serde(default = "default_self_update_enabled")]
    pub enabled: bool,

    /// Version endpoint returning `{version, address}`
    #[serde(default)]
    pub address: Option<String>,

    /// Prefix marking the staged copy of the executable
    #[serde(default = "default_staging_prefix")]
    pub staging_prefix: String,

    /// Interval between process-list polls during the handshake
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up waiting for the other process after this long
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
}

impl Default for SelfUpdateConfig {
    fn default() -> Self {
        Self {
            enabled: default_self_update_enabled(),
            address: None,
            staging_prefix: default_staging_prefix(),
            poll_interval_ms: default_poll_interval(),
            wait_timeout_secs: default_wait_timeout(),
        }
    }
}

fn default_self_update_enabled() -> bool {
    true
}
fn default_staging_prefix() -> String {
    "_".to_string()
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_wait_timeout() -> u64 {
    120
}

/// Terminal output preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DisplayConfig {
    /// Enable colored output
    #[serde(default = "default_color_enabled")]
    pub color_enabled: bool,

    /// Enable verbose output by default
    #[serde(default)]
    pub verbose: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            color_enabled: default_color_enabled(),
            verbose: false,
        }
    }
}

fn default_color_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.network.http_timeout_secs, 30);
        assert_eq!(config.transfer.validate_workers, 8);
        assert_eq!(config.transfer.download_workers, 2);
        assert_eq!(config.transfer.max_attempts, 3);
        assert_eq!(config.mirrors.default_channel, "master");
        assert_eq!(config.self_update.staging_prefix, "_");
    }

    #[test]
    fn test_retry_policy_lookup_falls_back_to_default() {
        let config = RuntimeConfig::default();
        let download = config.retry_policy("download");
        assert_eq!(download.initial_delay_ms, 500);

        let unknown = config.retry_policy("manifest");
        assert_eq!(unknown.max_attempts, 3);
        assert_eq!(unknown.strategy, RetryStrategy::ExponentialBackoff);
    }

    #[test]
    fn test_mirrors_config_kebab_case() {
        let yaml = r#"
default-channel: beta
channels:
  beta:
    - "https://a.example.com/mod/beta.json"
    - "https://b.example.com/mod/beta.json"
"#;
        let mirrors: MirrorsConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(mirrors.default_channel, "beta");
        assert_eq!(mirrors.channels["beta"].len(), 2);
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate(5);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.strategy, RetryStrategy::None);
    }

    #[test]
    fn test_transfer_config_serialization() {
        let config = TransferConfig {
            validate_workers: 4,
            download_workers: 1,
            max_attempts: 5,
        };
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert!(yaml.contains("validate-workers: 4"));
        assert!(yaml.contains("max-attempts: 5"));
    }
}
