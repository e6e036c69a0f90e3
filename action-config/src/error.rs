//! Configuration errors.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value `{value}` for environment variable {name}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// A request parameter held a value of the wrong shape.
    #[error("invalid request parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
    /// Parameters could not be deserialized into a typed structure.
    #[error("request parameters could not be decoded: {source}")]
    Decode {
        /// Source [`serde_json::Error`].
        #[from]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
