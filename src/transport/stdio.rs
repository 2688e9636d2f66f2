//! Pipe binding: newline delimited JSON-RPC over stdin/stdout.
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdout carries protocol messages only; logging goes to stderr
//!
//! The pipe binding has a single implicit session with no id. Exactly one
//! [`McpServer`] serves it for the whole run.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mcp::protocol::{JsonRpcError, OutgoingMessage};
use crate::mcp::McpServer;
use crate::repo::Repository;

/// Line framed transport over any reader/writer pair.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// The process's stdin/stdout.
pub type StdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wraps a reader and writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next frame without its line ending.
    ///
    /// Returns `None` on EOF. The bytes are not checked for UTF-8 here so a
    /// bad line can be answered instead of ending the session.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut frame = Vec::new();
        if self.reader.read_until(b'\n', &mut frame).await? == 0 {
            return Ok(None);
        }

        if frame.last() == Some(&b'\n') {
            frame.pop();
            if frame.last() == Some(&b'\r') {
                frame.pop();
            }
        }

        Ok(Some(frame))
    }

    /// Writes one message followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_message(&mut self, message: &OutgoingMessage) -> io::Result<()> {
        let json = message
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_raw(&json).await
    }

    async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Serves one session until EOF or cancellation.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing the pipe fails.
    pub async fn serve(
        &mut self,
        repository: Arc<Repository>,
        cancel: CancellationToken,
    ) -> io::Result<()> {
        let mut server = McpServer::new(repository);
        info!("Pipe session started");

        loop {
            let frame = tokio::select! {
                () = cancel.cancelled() => {
                    info!("Pipe session closed by shutdown");
                    return Ok(());
                }
                frame = self.read_frame() => frame?,
            };

            let Some(frame) = frame else {
                info!("stdin closed, ending pipe session");
                return Ok(());
            };

            let line = match String::from_utf8(frame) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Received a line that is not UTF-8");
                    self.write_message(&JsonRpcError::parse_error().into()).await?;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            debug!(bytes = line.len(), "Received message");
            if let Some(reply) = server.handle_line(&line).await {
                if cancel.is_cancelled() {
                    warn!("Dropping reply produced during shutdown");
                    return Ok(());
                }
                self.write_message(&reply).await?;
            }
        }
    }
}
