//! Atomic forwarding counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::pipe::Direction;

/// Counters shared by every listener and session of a supervisor.
#[derive(Debug, Default)]
pub struct ForwardStats {
    sessions_total: AtomicU64,
    sessions_active: AtomicU64,
    connect_failures: AtomicU64,
    accept_errors: AtomicU64,
    bytes_client_to_server: AtomicU64,
    bytes_server_to_client: AtomicU64,
}

/// Point-in-time copy of [`ForwardStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Sessions accepted since start.
    pub sessions_total: u64,
    /// Sessions currently forwarding.
    pub sessions_active: u64,
    /// Destination connects that failed.
    pub connect_failures: u64,
    /// Accept calls that returned an error.
    pub accept_errors: u64,
    /// Bytes relayed from clients to destinations.
    pub bytes_client_to_server: u64,
    /// Bytes relayed from destinations to clients.
    pub bytes_server_to_client: u64,
}

impl ForwardStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted client.
    pub fn session_accepted(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session entering the active state.
    pub fn session_activated(&self) {
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an active session closing.
    pub fn session_closed(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a failed destination connect.
    pub fn connect_failed(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accept error.
    pub fn accept_failed(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes relayed in one direction.
    pub fn add_bytes(&self, direction: Direction, bytes: u64) {
        let counter = match direction {
            Direction::ClientToServer => &self.bytes_client_to_server,
            Direction::ServerToClient => &self.bytes_server_to_client,
        };
        counter.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Take a snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            bytes_client_to_server: self.bytes_client_to_server.load(Ordering::Relaxed),
            bytes_server_to_client: self.bytes_server_to_client.load(Ordering::Relaxed),
        }
    }
}
