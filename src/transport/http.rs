//! Request/response binding: streamable HTTP on a single `/mcp` endpoint.
//!
//! - `POST /mcp` carries one JSON-RPC message. Without an `mcp-session-id`
//!   header only `initialize` is accepted; it creates the session and returns
//!   its id in the response header.
//! - `GET /mcp` attaches the session's notification stream.
//! - `DELETE /mcp` ends the session.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::{debug, info};

use super::session::{Session, SessionError, TransportKind};
use super::AppState;
use crate::mcp::protocol::{is_initialize_request, JsonRpcError, OutgoingMessage};
use crate::mcp::McpServer;

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Routes of the request/response binding.
pub fn routes() -> Router<AppState> {
    Router::new().route("/mcp", post(handle_post).get(handle_get).delete(handle_delete))
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn lookup(state: &AppState, headers: &HeaderMap) -> Result<Arc<Session>, SessionError> {
    let id = session_id(headers).ok_or(SessionError::Missing)?;
    state
        .registry
        .get(id)
        .ok_or_else(|| SessionError::NotFound(id.to_string()))
}

fn reply(message: Option<OutgoingMessage>) -> Response {
    match message {
        Some(message) => Json(message).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if session_id(&headers).is_some() {
        return match lookup(&state, &headers) {
            Ok(session) => match session.handle(&body).await {
                Ok(message) => reply(message),
                Err(e) => e.into_response(),
            },
            Err(e) => e.into_response(),
        };
    }

    let Ok(value) = serde_json::from_str::<Value>(&body) else {
        let error: OutgoingMessage = JsonRpcError::parse_error().into();
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    };
    if !is_initialize_request(&value) {
        return SessionError::Missing.into_response();
    }

    let id = uuid::Uuid::new_v4().to_string();
    let session = Arc::new(Session::new(
        id.clone(),
        TransportKind::RequestResponse,
        McpServer::new(Arc::clone(&state.repository)),
    ));
    state.registry.insert(Arc::clone(&session));

    let message = match session.handle(&body).await {
        Ok(message) => message,
        Err(e) => return e.into_response(),
    };
    if message.as_ref().is_some_and(OutgoingMessage::is_error) {
        debug!(session_id = %id, "Initialize failed, discarding session");
        state.registry.remove(&id);
        return reply(message);
    }

    info!(session_id = %id, "HTTP session created");
    let mut response = reply(message);
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn handle_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match lookup(&state, &headers) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let mut rx = match session.attach_stream() {
        Ok(rx) => rx,
        Err(e) => return e.into_response(),
    };
    debug!(session_id = %session.id(), "Notification stream attached");

    let stream = async_stream::stream! {
        while let Some(message) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().event("message").data(message));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

async fn handle_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match lookup(&state, &headers) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    match state.registry.remove(session.id()) {
        Some(_) => {
            info!(session_id = %session.id(), "HTTP session terminated");
            StatusCode::OK.into_response()
        }
        None => SessionError::NotFound(session.id().to_string()).into_response(),
    }
}
