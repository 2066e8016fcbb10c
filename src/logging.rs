//! Tracing setup for the portfwd binary.

use std::fs::OpenOptions;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LogLevel, LogOutput, LoggingConfig};

/// Logging initialization errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be opened.
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    /// `output = "file"` without a `file_path`.
    #[error("log output is 'file' but no file_path is set")]
    MissingFilePath,

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Filter directive for `level`. `debug` raises anything quieter than debug.
#[must_use]
pub fn filter_directive(level: LogLevel, debug: bool) -> String {
    let level = if debug && level != LogLevel::Trace {
        LogLevel::Debug
    } else {
        level
    };
    format!("portfwd={level},{level}")
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config.level, debug)));

    let (writer, ansi) = match config.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File => {
            let path = config
                .file_path
                .as_ref()
                .ok_or(LoggingError::MissingFilePath)?;
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        },
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_ansi(ansi).with_writer(writer))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_ansi(ansi).with_writer(writer))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Warn, false), "portfwd=warn,warn");
        assert_eq!(filter_directive(LogLevel::Warn, true), "portfwd=debug,debug");
        assert_eq!(filter_directive(LogLevel::Trace, true), "portfwd=trace,trace");
    }

    #[test]
    fn test_filter_directive_parses() {
        for level in [LogLevel::Trace, LogLevel::Info, LogLevel::Error] {
            assert!(EnvFilter::try_new(filter_directive(level, false)).is_ok());
        }
    }

    #[test]
    fn test_file_output_without_path() {
        let config = LoggingConfig {
            output: LogOutput::File,
            ..LoggingConfig::default()
        };
        assert!(matches!(
            init(&config, false),
            Err(LoggingError::MissingFilePath)
        ));
    }
}
