//! # Configuration System
//!
//! File-based configuration for portfwd: parsing, validation and conversion
//! of the `[forwards]` table into [`ForwardRule`](crate::forwarder::ForwardRule)s.
//!
//! TOML is the primary format. Files with a `.json` extension are read as
//! JSON with the same structure; comments are allowed in JSON files.
//!
//! ## Example Configuration
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "pretty"
//!
//! [forwarding]
//! buffer_size = 16384
//! keepalive = true
//!
//! [forwards]
//! "tcp://*:9000" = "127.0.0.1:80"
//! "tcp://127.0.0.1:2222" = "10.0.0.5:22"
//! ```

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, LoadedConfig};
pub use types::{
    ForwarderConfig, ForwardingSection, LogFormat, LogLevel, LogOutput, LoggingConfig,
};
pub use validation::{
    forward_field, BasicValidator, PortConflictValidator, ValidationIssue, ValidationResult,
    ValidationSeverity, Validator,
};
