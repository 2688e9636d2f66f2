//! Sessions and the per-binding session registry.
//!
//! A [`Session`] owns one [`McpServer`] and one outbound message channel.
//! Nothing in it is shared with any other session. Removal from a
//! [`SessionRegistry`] is the single teardown path: whoever gets the session
//! back from [`SessionRegistry::remove`] closes it, so teardown runs exactly
//! once no matter how many disconnect signals race.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::mcp::protocol::{ErrorCode, OutgoingMessage};
use crate::mcp::McpServer;

/// How a session's client is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Newline framed stdin/stdout.
    Pipe,
    /// Server-sent event stream plus a POST endpoint.
    PushStream,
    /// Streamable HTTP with a session header.
    RequestResponse,
}

/// Session lookup failures, rendered as JSON-RPC shaped HTTP errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The request carried no session id and is not an initialize request.
    #[error("Missing mcp-session-id header. Send an initialize request first.")]
    Missing,

    /// No live session has this id.
    #[error("Session not found. The session may have expired.")]
    NotFound(String),

    /// The session already has a stream attached.
    #[error("A stream is already attached to this session")]
    StreamAttached(String),
}

impl SessionError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Missing => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StreamAttached(_) => StatusCode::CONFLICT,
        }
    }

    /// JSON-RPC error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Missing => ErrorCode::INVALID_REQUEST,
            Self::NotFound(_) | Self::StreamAttached(_) => ErrorCode::SESSION_NOT_FOUND,
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let body = json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.code().code(),
                "message": self.to_string(),
            },
            "id": null,
        });
        (self.status(), Json(body)).into_response()
    }
}

/// One client connection.
pub struct Session {
    id: String,
    kind: TransportKind,
    server: tokio::sync::Mutex<McpServer>,
    stream: Mutex<Option<UnboundedSender<String>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session around its own server instance.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: TransportKind, server: McpServer) -> Self {
        Self {
            id: id.into(),
            kind,
            server: tokio::sync::Mutex::new(server),
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Binding this session belongs to.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Returns `true` once the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Processes one message on this session's server.
    ///
    /// Messages are handled one at a time in arrival order. A reply produced
    /// after the session closed is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session is or becomes closed.
    pub async fn handle(&self, body: &str) -> Result<Option<OutgoingMessage>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::NotFound(self.id.clone()));
        }
        let reply = self.server.lock().await.handle_line(body).await;
        if self.is_closed() {
            debug!(session_id = %self.id, "Discarding reply for closed session");
            return Err(SessionError::NotFound(self.id.clone()));
        }
        Ok(reply)
    }

    /// Attaches a new outbound stream.
    ///
    /// # Errors
    ///
    /// Fails if the session is closed or a live stream is already attached.
    pub fn attach_stream(&self) -> Result<UnboundedReceiver<String>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::NotFound(self.id.clone()));
        }
        let mut slot = self.stream.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(SessionError::StreamAttached(self.id.clone()));
        }
        let (tx, rx) = unbounded_channel();
        *slot = Some(tx);
        Ok(rx)
    }

    /// Pushes a message onto the attached stream. Returns `false` when no
    /// stream is listening.
    pub fn push(&self, message: &OutgoingMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        let Ok(json) = message.to_json() else {
            return false;
        };
        self.stream
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(json).is_ok())
    }

    /// Closes the session and ends its stream. Only the first call has any
    /// effect; it returns `true`.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.stream.lock().take();
        true
    }
}

/// Live sessions of one binding.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session.
    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.insert(session.id().to_string(), session);
    }

    /// Looks up a live session.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes and closes a session. Returns it only to the caller that
    /// actually removed it.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(id)?;
        session.close();
        info!(session_id = id, transport = ?session.kind(), "Session closed");
        Some(session)
    }

    /// Ids of all live sessions.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Removes and closes every session. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        self.ids()
            .into_iter()
            .filter(|id| self.remove(id).is_some())
            .count()
    }
}

/// Removes a session from its registry when dropped.
///
/// Held by a streaming response so a client disconnect tears the session
/// down.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: String,
}

impl SessionGuard {
    /// Guards the session `id` in `registry`.
    #[must_use]
    pub const fn new(registry: Arc<SessionRegistry>, id: String) -> Self {
        Self { registry, id }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.registry.remove(&self.id).is_some() {
            debug!(session_id = %self.id, "Stream dropped, session torn down");
        }
    }
}
