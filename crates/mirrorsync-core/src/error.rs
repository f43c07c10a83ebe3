//! Error types for mirrorsync-core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading runtime config or reading versions
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid runtime config: {message}")]
    InvalidConfig { message: String },

    /// A config layer that is not YAML, or that does not fit the runtime
    /// config schema once merged
    #[error("Cannot read config layer {layer}: {source}")]
    Yaml {
        layer: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Not a dotted numeric version: '{version}'")]
    InvalidVersion { version: String },

    #[error("Unknown channel '{channel}' (configured: {known})")]
    UnknownChannel { channel: String, known: String },

    #[error("Invalid mirror address '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl Error {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn yaml(layer: impl Into<String>, source: serde_yaml_ng::Error) -> Self {
        Self::Yaml {
            layer: layer.into(),
            source,
        }
    }

    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Unknown channel, listing the configured ones in sorted order
    pub fn unknown_channel<I, S>(channel: impl Into<String>, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = known.into_iter().map(|s| s.as_ref().to_owned()).collect();
        names.sort_unstable();
        Self::UnknownChannel {
            channel: channel.into(),
            known: names.join(", "),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_channel_lists_sorted_names() {
        let err = Error::unknown_channel("nightly", ["master", "beta"]);
        assert_eq!(
            err.to_string(),
            "Unknown channel 'nightly' (configured: beta, master)"
        );
    }

    #[test]
    fn test_yaml_error_names_layer() {
        let source = serde_yaml_ng::from_str::<serde_yaml_ng::Value>("a: [1").unwrap_err();
        let err = Error::yaml("/home/u/.mirrorsync/mirrorsync-runtime.yaml", source);
        assert!(err.to_string().starts_with("Cannot read config layer /home/u/"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
