//! TCP listener for a single forward rule.

use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::error::{ForwardError, ForwardResult};
use super::event::ForwardEvent;
use super::rule::{ForwardRule, ListenAddr};
use super::session::{ConnectionSession, SessionContext};

/// Pause after a transient accept error (e.g. descriptor exhaustion).
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(10);

/// Pending-connection queue length for listeners built through socket2.
const LISTEN_BACKLOG: i32 = 1024;

/// Accepts clients for one rule and hands each to its own session.
#[derive(Debug)]
pub struct ForwardListener {
    /// The rule this listener serves.
    rule: ForwardRule,

    /// The listening socket, owned exclusively by this listener.
    listener: TcpListener,

    /// The bound address.
    local_addr: SocketAddr,

    /// Collaborators passed to every session.
    ctx: SessionContext,
}

impl ForwardListener {
    /// Bind the rule's listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::BindError`] if no resolved address can be
    /// bound. The failure is also emitted as [`ForwardEvent::BindFailed`].
    pub async fn bind(rule: ForwardRule, ctx: SessionContext) -> ForwardResult<Self> {
        let bound = async {
            let listener = bind_listen_addr(&rule.listen).await?;
            let local_addr = listener.local_addr()?;
            Ok::<_, std::io::Error>((listener, local_addr))
        }
        .await;

        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                ctx.events.emit(ForwardEvent::BindFailed {
                    listen: rule.listen.to_string(),
                    error: e.to_string(),
                });
                return Err(ForwardError::BindError {
                    address: rule.listen.to_string(),
                    source: e,
                });
            },
        };

        debug!(
            listen = %rule.listen,
            address = %local_addr,
            "Successfully bound server socket"
        );

        Ok(Self {
            rule,
            listener,
            local_addr,
            ctx,
        })
    }

    /// Get the bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the rule served by this listener.
    #[must_use]
    pub fn rule(&self) -> &ForwardRule {
        &self.rule
    }

    /// Accept clients until the listening socket becomes unusable.
    ///
    /// Each accepted client is started on its own task; this loop never
    /// waits for a session.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError::AcceptError`] with the error that made the
    /// listening socket unusable.
    pub async fn run(self) -> ForwardResult<()> {
        self.ctx.events.emit(ForwardEvent::ListenerStarted {
            listen: self.local_addr,
            destination: self.rule.destination.to_string(),
        });

        let result = loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    self.ctx.stats.session_accepted();

                    let session = ConnectionSession::new(
                        peer_addr,
                        self.rule.destination.clone(),
                        self.ctx.clone(),
                    );
                    debug!(
                        session = session.id(),
                        peer = %peer_addr,
                        listen = %self.local_addr,
                        "Accepted connection"
                    );

                    tokio::spawn(async move {
                        session.start(stream).await;
                    });
                },
                Err(e) => {
                    self.ctx.stats.accept_failed();
                    self.ctx.events.emit(ForwardEvent::AcceptFailed {
                        listen: self.local_addr,
                        error: e.to_string(),
                    });

                    if is_fatal_accept_error(&e) {
                        break Err(ForwardError::AcceptError {
                            listen: self.local_addr,
                            source: e,
                        });
                    }

                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                },
            }
        };

        self.ctx.events.emit(ForwardEvent::ListenerStopped {
            listen: self.local_addr,
        });
        info!(listen = %self.local_addr, "Accept loop stopped");
        result
    }
}

/// Check if an accept error means the listening socket itself is unusable.
fn is_fatal_accept_error(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        error.kind(),
        ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::NotFound
    )
}

/// Bind `listen`. The wildcard host takes IPv4 and IPv6 clients on one
/// dual-stack socket, falling back to IPv4 only when IPv6 is unavailable.
async fn bind_listen_addr(listen: &ListenAddr) -> io::Result<TcpListener> {
    if listen.host.is_wildcard() {
        match bind_dual_stack(listen.port) {
            Ok(listener) => return Ok(listener),
            Err(e) if is_address_error(&e) => return Err(e),
            Err(e) => debug!(
                port = listen.port,
                error = %e,
                "IPv6 wildcard unavailable, binding IPv4 only"
            ),
        }
    }
    TcpListener::bind((listen.host.bind_host(), listen.port)).await
}

/// Errors about the port itself, which an IPv4 retry would hit as well.
fn is_address_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
    )
}

fn bind_dual_stack(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(false)?;
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)).into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}
