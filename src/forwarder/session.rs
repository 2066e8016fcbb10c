//! Per-connection forwarding session.
//!
//! A session owns one accepted client connection and the connection it opens
//! to the rule's destination. It relays both directions on two tasks and
//! tears both sockets down exactly once, whichever direction ends first.
//!
//! Teardown works on duplicated socket handles kept by the session: shutting
//! one down wakes any read or write the pipe tasks have pending on the same
//! socket, so the partner direction finishes promptly and drops its halves.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use socket2::{SockRef, Socket};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::error::{ForwardError, ForwardResult};
use super::event::{EventSink, ForwardEvent};
use super::pipe::{Direction, DuplexPipe, PipeOutcome, DEFAULT_BUFFER_SIZE};
use super::rule::Destination;
use super::stats::ForwardStats;

/// Session identifiers, unique for the process.
static SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connecting to the destination.
    Connecting,
    /// Both pipes are relaying.
    Active,
    /// Both sockets are closed. Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Tunables applied to every session of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Relay buffer size per direction.
    pub buffer_size: usize,
    /// Enable TCP keep-alive on both sockets.
    pub keepalive: bool,
    /// Upper bound on the destination connect, `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            keepalive: true,
            connect_timeout: None,
        }
    }
}

/// Shared collaborators handed to every session.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Session tunables.
    pub settings: SessionSettings,
    /// Lifecycle notice sink.
    pub events: EventSink,
    /// Forwarding counters.
    pub stats: Arc<ForwardStats>,
}

struct SessionInner {
    state: SessionState,
    client: Option<Socket>,
    server: Option<Socket>,
    server_addr: Option<SocketAddr>,
}

/// One client connection relayed to one destination connection.
pub struct ConnectionSession {
    id: u64,
    client_addr: SocketAddr,
    destination: Destination,
    ctx: SessionContext,
    inner: Mutex<SessionInner>,
}

impl ConnectionSession {
    /// Create a session for a client accepted from `client_addr`.
    #[must_use]
    pub fn new(client_addr: SocketAddr, destination: Destination, ctx: SessionContext) -> Arc<Self> {
        Arc::new(Self {
            id: SESSION_ID.fetch_add(1, Ordering::Relaxed),
            client_addr,
            destination,
            ctx,
            inner: Mutex::new(SessionInner {
                state: SessionState::Connecting,
                client: None,
                server: None,
                server_addr: None,
            }),
        })
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Client peer address.
    #[must_use]
    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// Destination peer address, once connected.
    #[must_use]
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.lock().server_addr
    }

    /// Configured destination.
    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Connect to the destination and start relaying `client`.
    ///
    /// Returns once both pipes are spawned, or once the session has been torn
    /// down because the destination could not be reached.
    pub async fn start(self: &Arc<Self>, client: TcpStream) {
        match SockRef::from(&client).try_clone() {
            Ok(handle) => self.lock().client = Some(handle),
            Err(e) => {
                debug!(session = self.id, error = %e, "Failed to duplicate client socket");
                self.teardown();
                return;
            },
        }

        let server = match self.connect().await {
            Ok(server) => server,
            Err(e) => {
                self.ctx.stats.connect_failed();
                self.ctx.events.emit(ForwardEvent::ConnectFailed {
                    destination: self.destination.to_string(),
                    error: e.to_string(),
                });
                self.teardown();
                return;
            },
        };

        let (server_handle, server_addr) = match Self::prepare_server(&server) {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!(session = self.id, error = %e, "Destination socket unusable");
                self.teardown();
                return;
            },
        };

        if self.ctx.settings.keepalive {
            for stream in [&client, &server] {
                if let Err(e) = SockRef::from(stream).set_keepalive(true) {
                    debug!(session = self.id, error = %e, "Failed to enable keep-alive");
                }
            }
        }

        {
            let mut inner = self.lock();
            if inner.state == SessionState::Closed {
                let _ = server_handle.shutdown(Shutdown::Both);
                return;
            }
            inner.server = Some(server_handle);
            inner.server_addr = Some(server_addr);
            inner.state = SessionState::Active;

            self.ctx.stats.session_activated();
            self.ctx.events.emit(ForwardEvent::Started {
                client: self.client_addr,
                server: server_addr,
            });
        }

        let (client_read, client_write) = client.into_split();
        let (server_read, server_write) = server.into_split();

        self.spawn_pipe(DuplexPipe::new(
            Direction::ClientToServer,
            client_read,
            server_write,
        ));
        self.spawn_pipe(DuplexPipe::new(
            Direction::ServerToClient,
            server_read,
            client_write,
        ));
    }

    /// Close both connections. Safe to call any number of times from any
    /// task; the stop notice is emitted only by the call that leaves the
    /// active state.
    pub fn teardown(&self) {
        let mut inner = self.lock();

        if let Some(server) = inner.server.take() {
            let _ = server.shutdown(Shutdown::Both);
        }
        if let Some(client) = inner.client.take() {
            let _ = client.shutdown(Shutdown::Both);
        }

        if inner.state == SessionState::Active {
            if let Some(server) = inner.server_addr {
                self.ctx.events.emit(ForwardEvent::Stopped {
                    client: self.client_addr,
                    server,
                });
            }
            self.ctx.stats.session_closed();
        }
        inner.state = SessionState::Closed;
    }

    async fn connect(&self) -> ForwardResult<TcpStream> {
        bounded_connect(
            TcpStream::connect(self.destination.connect_target()),
            self.ctx.settings.connect_timeout,
            &self.destination,
        )
        .await
    }

    fn prepare_server(server: &TcpStream) -> ForwardResult<(Socket, SocketAddr)> {
        let addr = server.peer_addr()?;
        let handle = SockRef::from(server).try_clone()?;
        Ok((handle, addr))
    }

    fn spawn_pipe<R, W>(self: &Arc<Self>, pipe: DuplexPipe<R, W>)
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let pipe = pipe
            .with_buffer_size(self.ctx.settings.buffer_size)
            .with_stats(Arc::clone(&self.ctx.stats));
        let session = Arc::clone(self);

        tokio::spawn(async move {
            let outcome = pipe.run().await;
            session.pipe_finished(&outcome);
        });
    }

    fn pipe_finished(&self, outcome: &PipeOutcome) {
        match &outcome.result {
            Ok(()) => debug!(
                session = self.id,
                direction = %outcome.direction,
                bytes = outcome.bytes,
                "Pipe reached end of stream"
            ),
            Err(e) => debug!(
                session = self.id,
                direction = %outcome.direction,
                bytes = outcome.bytes,
                error = %e,
                "Pipe failed"
            ),
        }
        self.teardown();
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keep-alive flags of the client and destination sockets, while held.
    #[cfg(test)]
    fn keepalive_flags(&self) -> (Option<bool>, Option<bool>) {
        let inner = self.lock();
        let flag = |socket: Option<&Socket>| socket.and_then(|s| s.keepalive().ok());
        (flag(inner.client.as_ref()), flag(inner.server.as_ref()))
    }
}

/// Await `connect`, giving up after `limit` when one is set.
async fn bounded_connect<F>(
    connect: F,
    limit: Option<Duration>,
    destination: &Destination,
) -> ForwardResult<TcpStream>
where
    F: Future<Output = io::Result<TcpStream>>,
{
    let result = match limit {
        Some(limit) => timeout(limit, connect)
            .await
            .map_err(|_| ForwardError::ConnectTimeout {
                destination: destination.to_string(),
            })?,
        None => connect.await,
    };

    result.map_err(|e| ForwardError::ConnectError {
        destination: destination.to_string(),
        source: e,
    })
}

impl fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("client_addr", &self.client_addr)
            .field("destination", &self.destination)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
