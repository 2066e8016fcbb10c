//! Supervisor running one listener per forward rule.

use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::error::{ForwardError, ForwardResult};
use super::event::ForwardEvent;
use super::listener::ForwardListener;
use super::rule::ForwardRule;
use super::session::{SessionContext, SessionSettings};
use super::stats::StatsSnapshot;

/// Bind outcome of one rule.
#[derive(Debug)]
pub struct BindReport {
    /// The rule.
    pub rule: ForwardRule,
    /// The bound address, or why binding failed.
    pub result: ForwardResult<SocketAddr>,
}

impl BindReport {
    /// Whether the listener bound and is accepting.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns the configured rules and the listener task of each.
pub struct ForwardingSupervisor {
    /// Rules in configuration order.
    rules: Vec<ForwardRule>,

    /// Shared session collaborators.
    ctx: SessionContext,

    /// Listener tasks.
    tasks: JoinSet<ForwardResult<()>>,

    /// Addresses of listeners that bound.
    bound: Vec<SocketAddr>,

    /// Whether `start` has been called.
    started: bool,
}

impl ForwardingSupervisor {
    /// Create a supervisor for `rules`.
    #[must_use]
    pub fn new(rules: Vec<ForwardRule>, settings: SessionSettings) -> Self {
        Self {
            rules,
            ctx: SessionContext {
                settings,
                ..SessionContext::default()
            },
            tasks: JoinSet::new(),
            bound: Vec::new(),
            started: false,
        }
    }

    /// Configured rules.
    #[must_use]
    pub fn rules(&self) -> &[ForwardRule] {
        &self.rules
    }

    /// Addresses of the listeners that bound successfully.
    #[must_use]
    pub fn bound_addrs(&self) -> &[SocketAddr] {
        &self.bound
    }

    /// Receive every lifecycle notice emitted from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ForwardEvent> {
        self.ctx.events.subscribe()
    }

    /// Snapshot of the forwarding counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Start one listener per rule.
    ///
    /// All listeners bind concurrently; a bind failure is reported in that
    /// rule's [`BindReport`] and does not affect the others. Returns after
    /// every listener has either bound or failed.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::AlreadyRunning`] if called twice.
    pub async fn start(&mut self) -> ForwardResult<Vec<BindReport>> {
        if self.started {
            return Err(ForwardError::AlreadyRunning);
        }
        self.started = true;

        info!(rules = self.rules.len(), "Starting TCP forwarders");

        let mut pending = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let (tx, rx) = oneshot::channel();
            let ctx = self.ctx.clone();
            let task_rule = rule.clone();

            self.tasks.spawn(async move {
                match ForwardListener::bind(task_rule, ctx).await {
                    Ok(listener) => {
                        let _ = tx.send(Ok(listener.local_addr()));
                        listener.run().await
                    },
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        Ok(())
                    },
                }
            });
            pending.push((rule.clone(), rx));
        }

        let mut reports = Vec::with_capacity(pending.len());
        for (rule, rx) in pending {
            let result = rx.await.unwrap_or_else(|_| {
                Err(ForwardError::ListenerGone {
                    address: rule.listen.to_string(),
                })
            });
            match &result {
                Ok(addr) => {
                    info!(rule = %rule, address = %addr, "Forwarder listening");
                    self.bound.push(*addr);
                },
                Err(e) => warn!(rule = %rule, error = %e, "Forwarder not started"),
            }
            reports.push(BindReport { rule, result });
        }

        info!(
            listening = self.bound.len(),
            failed = reports.len() - self.bound.len(),
            "Done starting forwarders"
        );
        Ok(reports)
    }

    /// Wait until every listener has stopped.
    pub async fn wait(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {},
                Ok(Err(e)) => error!(error = %e, "Listener stopped with error"),
                Err(e) if e.is_cancelled() => {},
                Err(e) => error!(error = %e, "Listener task panicked"),
            }
        }
    }

    /// Stop every listener. Sessions already running are left to finish.
    pub async fn shutdown(&mut self) {
        info!(listeners = self.tasks.len(), "Stopping TCP forwarders");
        self.tasks.shutdown().await;
        self.bound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarder::rule::{Destination, ListenAddr};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn rule(listen_port: u16, dest_port: u16) -> ForwardRule {
        ForwardRule::new(
            ListenAddr::named("127.0.0.1", listen_port),
            Destination::new("127.0.0.1", dest_port),
        )
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let mut supervisor = ForwardingSupervisor::new(vec![rule(0, 80)], SessionSettings::default());
        supervisor.start().await.unwrap();
        assert!(matches!(
            supervisor.start().await,
            Err(ForwardError::AlreadyRunning)
        ));
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_failure_isolated() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_port = taken.local_addr().unwrap().port();
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_port = backend.local_addr().unwrap().port();

        let mut supervisor = ForwardingSupervisor::new(
            vec![rule(taken_port, backend_port), rule(0, backend_port)],
            SessionSettings::default(),
        );
        let reports = supervisor.start().await.unwrap();

        assert_eq!(reports.len(), 2);
        assert!(!reports[0].is_bound());
        assert!(reports[1].is_bound());
        assert_eq!(supervisor.bound_addrs().len(), 1);

        let addr = *reports[1].result.as_ref().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"hello").await.unwrap();

        let (mut upstream, _) = tokio::time::timeout(Duration::from_secs(5), backend.accept())
            .await
            .unwrap()
            .unwrap();
        let mut buf = [0u8; 5];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_returns_after_shutdown() {
        let mut supervisor = ForwardingSupervisor::new(vec![rule(0, 80)], SessionSettings::default());
        supervisor.start().await.unwrap();
        supervisor.shutdown().await;

        tokio::time::timeout(Duration::from_secs(1), supervisor.wait())
            .await
            .unwrap();
        assert!(supervisor.bound_addrs().is_empty());
    }

    #[tokio::test]
    async fn test_stats_start_empty() {
        let supervisor = ForwardingSupervisor::new(Vec::new(), SessionSettings::default());
        assert_eq!(supervisor.stats(), StatsSnapshot::default());
        assert!(supervisor.rules().is_empty());
    }
}
