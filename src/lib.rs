//! # portfwd
//!
//! A TCP port-forwarding daemon. Each configured rule binds a listening
//! socket and relays every accepted connection, byte for byte, to a fixed
//! destination.
//!
//! ## Modules
//!
//! - [`forwarder`]: listeners, sessions and the directional relay
//! - [`config`]: TOML/JSON configuration with validation
//! - [`logging`]: `tracing` subscriber setup

pub mod config;
pub mod forwarder;
pub mod logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
