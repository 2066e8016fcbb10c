//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::forwarder::RuleParseError;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file '{path}': {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML content.
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse JSON content.
    #[error("failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A forward entry could not be parsed.
    #[error("invalid forward '{listen}': {source}")]
    InvalidRule {
        /// The listen key of the entry.
        listen: String,
        /// Why it was rejected.
        #[source]
        source: RuleParseError,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),

    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
