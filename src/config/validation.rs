//! Configuration validation system.

use std::fmt;

use super::types::{ForwarderConfig, LogOutput};
use crate::forwarder::{ForwardRule, RuleParseError};

/// One problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path of the offending field, e.g. `forwards."tcp://*:9000"`.
    pub field: String,
    /// What is wrong.
    pub message: String,
    /// Whether the configuration is rejected.
    pub severity: ValidationSeverity,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// The configuration is rejected.
    Error,
    /// Reported, but the configuration is still used.
    Warning,
}

/// Field path of the `forwards` entry keyed by `listen`.
#[must_use]
pub fn forward_field(listen: &str) -> String {
    format!("forwards.\"{listen}\"")
}

/// Issues reported by one or more validators.
#[derive(Debug, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a result with no issues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(field, message, ValidationSeverity::Error);
    }

    /// Record a warning.
    pub fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(field, message, ValidationSeverity::Warning);
    }

    fn push(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        severity: ValidationSeverity,
    ) {
        self.issues.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
            severity,
        });
    }

    /// Append every issue of `other`.
    pub fn extend(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
    }

    /// Whether no error was recorded. Warnings do not count.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Every issue, in the order recorded.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Issues that reject the configuration.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.by_severity(ValidationSeverity::Error)
    }

    /// Issues that are only reported.
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.by_severity(ValidationSeverity::Warning)
    }

    fn by_severity(&self, severity: ValidationSeverity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any errors.
    fn validate(&self, config: &ForwarderConfig) -> ValidationResult;
}

/// Built-in validator for basic configuration checks.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &ForwarderConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.forwards.is_empty() {
            result.error("forwards", "At least one forward is required");
        }

        for (listen, destination) in &config.forwards {
            if let Err(e) = ForwardRule::parse(listen, destination) {
                let field = match e {
                    RuleParseError::MalformedDestination(_) => forward_field(listen),
                    _ => format!("{} (key)", forward_field(listen)),
                };
                result.error(field, e.to_string());
            }
        }

        if config.forwarding.buffer_size == 0 {
            result.error("forwarding.buffer_size", "Buffer size must be greater than 0");
        }

        if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
            result.error(
                "logging.file_path",
                "File path is required when output is 'file'",
            );
        }

        result
    }
}

/// Validator that flags listen endpoints competing for the same socket.
///
/// Conflicts are warnings: the second listener fails to bind at runtime and
/// is reported without affecting the others.
#[derive(Debug, Default)]
pub struct PortConflictValidator;

impl PortConflictValidator {
    /// Create a new port conflict validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for PortConflictValidator {
    fn validate(&self, config: &ForwarderConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        // Unparsable entries are BasicValidator's concern.
        let rules: Vec<ForwardRule> = config
            .forwards
            .iter()
            .filter_map(|(l, d)| ForwardRule::parse(l, d).ok())
            .collect();

        for (i, rule) in rules.iter().enumerate() {
            if let Some(earlier) = rules[..i].iter().find(|r| r.listen.overlaps(&rule.listen)) {
                result.warning(
                    forward_field(&format!("tcp://{}", rule.listen)),
                    format!(
                        "Listen address {} conflicts with {}; only one can bind",
                        rule.listen, earlier.listen
                    ),
                );
            }
        }

        result
    }
}
