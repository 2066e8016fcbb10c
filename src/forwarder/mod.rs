//! # TCP Forwarder
//!
//! The connection-forwarding core of portfwd.
//!
//! ## Components
//!
//! - [`DuplexPipe`] copies one direction of a connection
//! - [`ConnectionSession`] pairs a client with its destination connection and
//!   tears both down exactly once
//! - [`ForwardListener`] accepts clients for one [`ForwardRule`]
//! - [`ForwardingSupervisor`] runs one listener per rule
//!
//! Control flows top-down: supervisor → listeners → one session per accepted
//! client → two pipes per session. Every unit runs on its own tokio task.
//!
//! ## Example
//!
//! ```no_run
//! use portfwd::forwarder::{ForwardRule, ForwardingSupervisor, SessionSettings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let rule = ForwardRule::parse("tcp://*:9000", "127.0.0.1:80")?;
//! let mut supervisor = ForwardingSupervisor::new(vec![rule], SessionSettings::default());
//! supervisor.start().await?;
//! supervisor.wait().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod event;
mod listener;
mod pipe;
mod rule;
mod session;
mod stats;
mod supervisor;

pub use error::{ForwardError, ForwardResult};
pub use event::{EventSink, ForwardEvent};
pub use listener::ForwardListener;
pub use pipe::{Direction, DuplexPipe, PipeOutcome, DEFAULT_BUFFER_SIZE};
pub use rule::{
    Destination, ForwardRule, ListenAddr, ListenHost, RuleParseError, TCP_SCHEME, WILDCARD_HOST,
};
pub use session::{ConnectionSession, SessionContext, SessionSettings, SessionState};
pub use stats::{ForwardStats, StatsSnapshot};
pub use supervisor::{BindReport, ForwardingSupervisor};
