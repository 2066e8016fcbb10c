//! Lifecycle notices emitted by listeners and sessions.
//!
//! Every notice is written as a `tracing` record. Subscribers registered on
//! the [`EventSink`] additionally receive a [`ForwardEvent`] over an
//! unbounded channel; a closed subscriber is silently dropped.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// A lifecycle notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardEvent {
    /// A listener bound its socket and is accepting.
    ListenerStarted {
        /// The bound local address.
        listen: SocketAddr,
        /// Destination of the rule.
        destination: String,
    },

    /// A listener could not bind.
    BindFailed {
        /// The listen endpoint, as configured.
        listen: String,
        /// Error detail.
        error: String,
    },

    /// An accept call failed.
    AcceptFailed {
        /// The bound local address.
        listen: SocketAddr,
        /// Error detail.
        error: String,
    },

    /// A listener's accept loop exited.
    ListenerStopped {
        /// The bound local address.
        listen: SocketAddr,
    },

    /// A session could not reach its destination.
    ConnectFailed {
        /// The destination, as configured.
        destination: String,
        /// Error detail.
        error: String,
    },

    /// A session began forwarding.
    Started {
        /// Client peer address.
        client: SocketAddr,
        /// Destination peer address.
        server: SocketAddr,
    },

    /// A session stopped forwarding.
    Stopped {
        /// Client peer address.
        client: SocketAddr,
        /// Destination peer address.
        server: SocketAddr,
    },
}

/// Fan-out point for [`ForwardEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ForwardEvent>>>>,
}

impl EventSink {
    /// Create a sink with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ForwardEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Log an event and deliver it to every live subscriber.
    pub fn emit(&self, event: ForwardEvent) {
        log_event(&event);

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn log_event(event: &ForwardEvent) {
    match event {
        ForwardEvent::ListenerStarted {
            listen,
            destination,
        } => info!(%listen, %destination, "TCP listener accepting"),
        ForwardEvent::BindFailed { listen, error } => {
            error!(%listen, %error, "Failed to bind TCP listener");
        },
        ForwardEvent::AcceptFailed { listen, error } => {
            warn!(%listen, %error, "Accept failed");
        },
        ForwardEvent::ListenerStopped { listen } => info!(%listen, "TCP listener stopped"),
        ForwardEvent::ConnectFailed { destination, error } => {
            warn!(%error, "Can not connect to {destination}");
        },
        ForwardEvent::Started { client, server } => {
            info!("TCP Forwarding {client} <--> {server} started.");
        },
        ForwardEvent::Stopped { client, server } => {
            info!("TCP Forwarding {client} <--> {server} stopped.");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::new();
        sink.emit(ForwardEvent::ListenerStopped { listen: addr(1) });
    }

    #[test]
    fn test_every_subscriber_receives() {
        let sink = EventSink::new();
        let mut a = sink.subscribe();
        let mut b = sink.clone().subscribe();

        let event = ForwardEvent::Started {
            client: addr(40000),
            server: addr(80),
        };
        sink.emit(event.clone());

        assert_eq!(a.try_recv().unwrap(), event);
        assert_eq!(b.try_recv().unwrap(), event);
    }

    #[test]
    fn test_closed_subscriber_dropped() {
        let sink = EventSink::new();
        let rx = sink.subscribe();
        drop(rx);

        sink.emit(ForwardEvent::ListenerStopped { listen: addr(1) });
        assert!(sink.subscribers.lock().unwrap().is_empty());
    }
}
