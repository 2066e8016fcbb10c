//! Forwarder error types.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur while forwarding connections.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Failed to bind the listening socket.
    #[error("failed to bind to {address}: {source}")]
    BindError {
        /// The listen endpoint, as configured.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept a connection.
    #[error("failed to accept connection on {listen}: {source}")]
    AcceptError {
        /// The local listening address.
        listen: SocketAddr,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to connect to the destination.
    #[error("cannot connect to {destination}: {source}")]
    ConnectError {
        /// The destination, as configured.
        destination: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Connecting to the destination took longer than the configured timeout.
    #[error("connection to {destination} timed out")]
    ConnectTimeout {
        /// The destination, as configured.
        destination: String,
    },

    /// IO error during data transfer.
    #[error("stream error: {0}")]
    StreamError(#[from] std::io::Error),

    /// The listener task ended without reporting its bind outcome.
    #[error("listener for {address} exited before binding")]
    ListenerGone {
        /// The listen endpoint, as configured.
        address: String,
    },

    /// Supervisor is already running.
    #[error("forwarding supervisor is already running")]
    AlreadyRunning,
}

/// Result type for forwarding operations.
pub type ForwardResult<T> = Result<T, ForwardError>;
