//! One-way byte relay between two streams.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::stats::ForwardStats;

/// Default relay buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 16384;

/// Which way a pipe moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to destination.
    ClientToServer,
    /// Destination to client.
    ServerToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "client->server"),
            Self::ServerToClient => write!(f, "server->client"),
        }
    }
}

/// How a pipe finished.
#[derive(Debug)]
pub struct PipeOutcome {
    /// Direction of the pipe.
    pub direction: Direction,
    /// Bytes written to the destination stream.
    pub bytes: u64,
    /// `Ok` on end-of-stream, the read or write error otherwise.
    pub result: io::Result<()>,
}

impl PipeOutcome {
    /// Whether the source reached end-of-stream cleanly.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.result.is_ok()
    }
}

/// Copies everything read from `reader` into `writer` with a fixed buffer.
pub struct DuplexPipe<R, W> {
    direction: Direction,
    reader: R,
    writer: W,
    buffer_size: usize,
    stats: Option<Arc<ForwardStats>>,
}

impl<R, W> DuplexPipe<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a pipe with the default buffer size.
    pub fn new(direction: Direction, reader: R, writer: W) -> Self {
        Self {
            direction,
            reader,
            writer,
            buffer_size: DEFAULT_BUFFER_SIZE,
            stats: None,
        }
    }

    /// Set the buffer size. Zero is clamped to one byte.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Account relayed bytes in `stats`.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<ForwardStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Relay until end-of-stream or the first IO error.
    ///
    /// Both streams are dropped when this returns.
    pub async fn run(mut self) -> PipeOutcome {
        let mut buf = vec![0u8; self.buffer_size];
        let mut bytes = 0u64;

        let result = loop {
            let n = match self.reader.read(&mut buf).await {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(e),
            };

            // write_all retries short writes
            if let Err(e) = self.writer.write_all(&buf[..n]).await {
                break Err(e);
            }

            bytes += n as u64;
            if let Some(stats) = &self.stats {
                stats.add_bytes(self.direction, n as u64);
            }
        };

        PipeOutcome {
            direction: self.direction,
            bytes,
            result,
        }
    }
}
