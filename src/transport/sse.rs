//! Push-stream binding: a long-lived SSE stream plus a POST endpoint.
//!
//! `GET /sse` opens the stream, creates the session and announces the POST
//! endpoint in a first `endpoint` event. Replies to messages posted on
//! `/message` are delivered on the stream as `message` events. Dropping the
//! stream tears the session down.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::session::{Session, SessionError, SessionGuard, TransportKind};
use super::AppState;
use crate::mcp::McpServer;

/// Header that may carry the session id on `/message`.
pub const SESSION_HEADER: &str = "x-mcp-session-id";

/// Routes of the push-stream binding.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sse", get(open_stream))
        .route("/message", post(post_message))
}

#[derive(Debug, Default, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn open_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, SessionError> {
    let id = uuid::Uuid::new_v4().to_string();
    let session = Arc::new(Session::new(
        id.clone(),
        TransportKind::PushStream,
        McpServer::new(Arc::clone(&state.repository)),
    ));
    let mut rx = session.attach_stream()?;
    state.registry.insert(session);
    info!(session_id = %id, "SSE connection established");

    let guard = SessionGuard::new(Arc::clone(&state.registry), id.clone());
    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(format!("/message?sessionId={id}")));
        while let Some(message) = rx.recv().await {
            yield Ok(Event::default().event("message").data(message));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Picks the session id from the header, then the query, then the body.
/// Blank values are skipped.
fn resolve_session_id(headers: &HeaderMap, query: &MessageQuery, body: Option<&Value>) -> Option<String> {
    let present = |id: &str| !id.trim().is_empty();
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| present(id));
    let from_query = query.session_id.as_deref().filter(|id| present(id));
    let from_body = body
        .and_then(|b| b.get("sessionId"))
        .and_then(Value::as_str)
        .filter(|id| present(id));
    from_header.or(from_query).or(from_body).map(str::to_string)
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<MessageQuery>, QueryRejection>,
    body: String,
) -> Response {
    let query = query.map_or_else(
        |rejection| {
            debug!(error = %rejection, "Ignoring unreadable query string");
            MessageQuery::default()
        },
        |Query(query)| query,
    );
    let parsed = serde_json::from_str::<Value>(&body).ok();
    let Some(id) = resolve_session_id(&headers, &query, parsed.as_ref()) else {
        return SessionError::Missing.into_response();
    };
    let Some(session) = state.registry.get(&id) else {
        return SessionError::NotFound(id).into_response();
    };

    match session.handle(&body).await {
        Ok(Some(message)) => {
            if !session.push(&message) {
                warn!(session_id = %id, "No stream listening, reply dropped");
            }
        }
        Ok(None) => debug!(session_id = %id, "Notification accepted"),
        Err(e) => return e.into_response(),
    }
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn query(id: Option<&str>) -> MessageQuery {
        MessageQuery {
            session_id: id.map(str::to_string),
        }
    }

    #[test]
    fn header_wins_over_query_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("from-header"));
        let body = json!({"sessionId": "from-body"});
        assert_eq!(
            resolve_session_id(&headers, &query(Some("from-query")), Some(&body)).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn query_wins_over_body() {
        let body = json!({"sessionId": "from-body"});
        assert_eq!(
            resolve_session_id(&HeaderMap::new(), &query(Some("from-query")), Some(&body)).as_deref(),
            Some("from-query")
        );
        assert_eq!(
            resolve_session_id(&HeaderMap::new(), &query(None), Some(&body)).as_deref(),
            Some("from-body")
        );
    }

    #[test]
    fn blank_or_absent_id() {
        assert!(resolve_session_id(&HeaderMap::new(), &query(None), None).is_none());
        assert!(resolve_session_id(&HeaderMap::new(), &query(Some("  ")), None).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static(" "));
        assert_eq!(
            resolve_session_id(&headers, &query(Some("from-query")), None).as_deref(),
            Some("from-query")
        );
    }
}
