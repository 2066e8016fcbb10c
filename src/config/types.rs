//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};
use crate::forwarder::{ForwardRule, SessionSettings, DEFAULT_BUFFER_SIZE};

/// Root configuration structure for portfwd.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Session tunables shared by every rule.
    pub forwarding: ForwardingSection,

    /// Forward rules: `"tcp://host:port" = "host:port"`.
    pub forwards: BTreeMap<String, String>,
}

impl ForwarderConfig {
    /// Parse every entry of `forwards` into a rule, ordered by listen key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] for the first malformed entry.
    pub fn rules(&self) -> ConfigResult<Vec<ForwardRule>> {
        self.forwards
            .iter()
            .map(|(listen, destination)| {
                ForwardRule::parse(listen, destination).map_err(|source| {
                    ConfigError::InvalidRule {
                        listen: listen.clone(),
                        source,
                    }
                })
            })
            .collect()
    }

    /// Add a forward entry.
    #[must_use]
    pub fn with_forward(mut self, listen: &str, destination: &str) -> Self {
        self.forwards
            .insert(listen.to_string(), destination.to_string());
        self
    }
}

/// Session tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingSection {
    /// Relay buffer size per direction, in bytes.
    pub buffer_size: usize,

    /// Enable TCP keep-alive on client and destination sockets.
    pub keepalive: bool,

    /// Destination connect timeout in seconds (0 = wait for the OS).
    pub connect_timeout_secs: u64,
}

impl Default for ForwardingSection {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            keepalive: true,
            connect_timeout_secs: 0,
        }
    }
}

impl ForwardingSection {
    /// Get the connect timeout as an `Option<Duration>`.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.connect_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.connect_timeout_secs))
        }
    }

    /// Settings handed to every session.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            buffer_size: self.buffer_size,
            keepalive: self.keepalive,
            connect_timeout: self.connect_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: LogLevel,

    /// Log format (json, pretty, compact).
    pub format: LogFormat,

    /// Output destination.
    pub output: LogOutput,

    /// Log file path (when output is "file").
    pub file_path: Option<PathBuf>,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level (least verbose).
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable).
    Json,
    /// Multi-line human format (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output (default).
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// File output.
    File,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::{Destination, ListenAddr};

    #[test]
    fn test_default_config() {
        let config = ForwarderConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.forwarding.buffer_size, 16384);
        assert!(config.forwarding.keepalive);
        assert!(config.forwarding.connect_timeout().is_none());
        assert!(config.forwards.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [logging]
            level = "debug"
            format = "json"
            output = "file"
            file_path = "/var/log/portfwd.log"

            [forwarding]
            buffer_size = 8192
            keepalive = false
            connect_timeout_secs = 3

            [forwards]
            "tcp://*:9000" = "127.0.0.1:80"
            "tcp://127.0.0.1:2222" = "10.0.0.5:22"
        "#;

        let config: ForwarderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.output, LogOutput::File);
        assert_eq!(config.forwarding.buffer_size, 8192);
        assert_eq!(
            config.forwarding.connect_timeout(),
            Some(Duration::from_secs(3))
        );

        let settings = config.forwarding.session_settings();
        assert!(!settings.keepalive);
        assert_eq!(settings.buffer_size, 8192);

        let rules = config.rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].listen, ListenAddr::any(9000));
        assert_eq!(rules[0].destination, Destination::new("127.0.0.1", 80));
        assert_eq!(rules[1].listen, ListenAddr::named("127.0.0.1", 2222));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config: ForwarderConfig = toml::from_str(
            r#"
            comment = "ignored"

            [forwards]
            "tcp://*:9000" = "127.0.0.1:80"
        "#,
        )
        .unwrap();
        assert_eq!(config.forwards.len(), 1);
    }

    #[test]
    fn test_invalid_rule_reported() {
        let config = ForwarderConfig::default().with_forward("udp://*:53", "8.8.8.8:53");
        let err = config.rules().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { ref listen, .. } if listen == "udp://*:53"));
    }
}
