//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::ForwarderConfig;
use super::validation::{ValidationIssue, ValidationResult, Validator};
use json_comments::StripComments;
use std::path::Path;

/// On-disk configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (default).
    Toml,
    /// JSON, selected by a `.json` extension.
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Configuration loader with validation support.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Load configuration from a file path.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<LoadedConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        match ConfigFormat::from_path(path) {
            ConfigFormat::Toml => self.load_str(&content),
            ConfigFormat::Json => self.load_json_str(&content),
        }
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn load_str(&self, content: &str) -> ConfigResult<LoadedConfig> {
        let config: ForwarderConfig = toml::from_str(content)?;
        self.validate(config)
    }

    /// Load configuration from a JSON string.
    ///
    /// `//`, `/* */` and `#` comments are allowed and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or validation fails.
    pub fn load_json_str(&self, content: &str) -> ConfigResult<LoadedConfig> {
        let config: ForwarderConfig =
            serde_json::from_reader(StripComments::new(content.as_bytes()))?;
        self.validate(config)
    }

    /// Run every registered validator over `config`.
    ///
    /// Warnings from all validators are kept on the returned
    /// [`LoadedConfig`]; the caller decides where to report them.
    fn validate(&self, config: ForwarderConfig) -> ConfigResult<LoadedConfig> {
        let mut result = ValidationResult::new();
        for validator in &self.validators {
            result.extend(validator.validate(&config));
        }

        if !result.is_valid() {
            let errors: Vec<String> = result.errors().map(ToString::to_string).collect();
            return Err(ConfigError::ValidationError(errors.join("; ")));
        }

        Ok(LoadedConfig {
            config,
            warnings: result.warnings().cloned().collect(),
        })
    }
}

/// A configuration that passed validation.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The parsed configuration.
    pub config: ForwarderConfig,
    /// Non-fatal issues found by the validators.
    pub warnings: Vec<ValidationIssue>,
}
