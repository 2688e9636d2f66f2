//! Integration tests for the HTTP transport bindings.
//!
//! Routers are driven in-process with `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{initialize_request, initialized_notification, repository, SpySource};
use librechat_client_mcp::transport::{http_router, sse_router, AppState};

const SESSION: &str = "mcp-session-id";

fn state() -> AppState {
    AppState::new(repository(Arc::new(SpySource::librechat())))
}

fn request(method: Method, uri: &str, session: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = session {
        builder = builder.header(SESSION, id);
    }
    let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
    builder.body(body).unwrap()
}

async fn call(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Initializes a session and completes the handshake. Returns its id.
async fn open_session(app: &Router) -> String {
    let response = call(app, request(Method::POST, "/mcp", None, Some(&initialize_request(1)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get(SESSION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    let body = json_body(response).await;
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");

    let ack = call(
        app,
        request(Method::POST, "/mcp", Some(&id), Some(&initialized_notification())),
    )
    .await;
    assert_eq!(ack.status(), StatusCode::ACCEPTED);
    id
}

fn tools_list(id: i64) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": "tools/list"})
}

#[tokio::test]
async fn post_without_session_requires_initialize() {
    let app = http_router(state(), &[]);

    let response = call(&app, request(Method::POST, "/mcp", None, Some(&tools_list(1)))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32600);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Missing mcp-session-id"));
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = http_router(state(), &[]);

    let response = call(
        &app,
        request(Method::POST, "/mcp", Some("no-such-session"), Some(&tools_list(1))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], -32000);
}

#[tokio::test]
async fn delete_distinguishes_missing_and_unknown_ids() {
    let app = http_router(state(), &[]);

    let missing = call(&app, request(Method::DELETE, "/mcp", None, None)).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(missing).await["error"]["code"], -32600);

    let unknown = call(&app, request(Method::DELETE, "/mcp", Some("nope"), None)).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(unknown).await["error"]["code"], -32000);
}

#[tokio::test]
async fn sessions_are_isolated_and_independently_closed() {
    let state = state();
    let registry = Arc::clone(&state.registry);
    let app = http_router(state, &[]);

    let a = open_session(&app).await;
    let b = open_session(&app).await;
    assert_ne!(a, b);
    assert_eq!(registry.len(), 2);

    let reply_a = json_body(call(&app, request(Method::POST, "/mcp", Some(&a), Some(&tools_list(100)))).await).await;
    let reply_b = json_body(call(&app, request(Method::POST, "/mcp", Some(&b), Some(&tools_list(200)))).await).await;
    assert_eq!(reply_a["id"], 100);
    assert_eq!(reply_b["id"], 200);

    let deleted = call(&app, request(Method::DELETE, "/mcp", Some(&a), None)).await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = call(&app, request(Method::POST, "/mcp", Some(&a), Some(&tools_list(101)))).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let still_there = call(&app, request(Method::POST, "/mcp", Some(&b), Some(&tools_list(201)))).await;
    assert_eq!(still_there.status(), StatusCode::OK);
    assert_eq!(json_body(still_there).await["id"], 201);

    let connections = json_body(call(&app, request(Method::GET, "/connections", None, None)).await).await;
    assert_eq!(connections["total"], 1);
    assert_eq!(connections["connections"], json!([b]));

    let again = call(&app, request(Method::DELETE, "/mcp", Some(&a), None)).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notification_stream_is_exclusive() {
    let app = http_router(state(), &[]);
    let id = open_session(&app).await;

    let first = call(&app, request(Method::GET, "/mcp", Some(&id), None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream")));

    let second = call(&app, request(Method::GET, "/mcp", Some(&id), None)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    drop(first);
    let third = call(&app, request(Method::GET, "/mcp", Some(&id), None)).await;
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_active_connections() {
    let app = http_router(state(), &[]);
    open_session(&app).await;

    let health = json_body(call(&app, request(Method::GET, "/health", None, None)).await).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["activeConnections"], 1);
    assert_eq!(health["serverInfo"]["name"], "librechat-client-mcp");
    assert!(health["timestamp"].is_string());
}

#[tokio::test]
async fn cors_exposes_session_header() {
    let app = http_router(state(), &["https://app.example.com".to_string()]);

    let response = call(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header("origin", "https://app.example.com")
            .header("content-type", "application/json")
            .body(Body::from(initialize_request(1).to_string()))
            .unwrap(),
    )
    .await;
    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "https://app.example.com"
    );
    assert!(headers
        .get("access-control-expose-headers")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SESSION)));
}

// =============================================================================
// Push-stream binding
// =============================================================================

#[tokio::test]
async fn sse_stream_announces_endpoint_and_tears_down_on_drop() {
    let state = state();
    let registry = Arc::clone(&state.registry);
    let app = sse_router(state, &[]);

    let response = call(&app, request(Method::GET, "/sse", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(registry.len(), 1);
    let id = registry.ids().remove(0);

    let mut stream = response.into_body().into_data_stream();
    let first = stream.next().await.unwrap().unwrap();
    let first = String::from_utf8_lossy(&first);
    assert!(first.contains("event: endpoint"));
    assert!(first.contains(&format!("/message?sessionId={id}")));

    let posted = call(
        &app,
        request(
            Method::POST,
            &format!("/message?sessionId={id}"),
            None,
            Some(&initialize_request(7)),
        ),
    )
    .await;
    assert_eq!(posted.status(), StatusCode::ACCEPTED);

    let event = stream.next().await.unwrap().unwrap();
    let event = String::from_utf8_lossy(&event);
    assert!(event.contains("event: message"));
    assert!(event.contains("\"id\":7"));

    drop(stream);
    assert!(registry.is_empty());

    let after = call(
        &app,
        request(
            Method::POST,
            &format!("/message?sessionId={id}"),
            None,
            Some(&tools_list(8)),
        ),
    )
    .await;
    assert_eq!(after.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sse_message_requires_session() {
    let app = sse_router(state(), &[]);

    let missing = call(&app, request(Method::POST, "/message", None, Some(&tools_list(1)))).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let unknown = call(
        &app,
        request(Method::POST, "/message?sessionId=nope", None, Some(&tools_list(1))),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sse_repeated_session_query_is_json_rpc_error() {
    let app = sse_router(state(), &[]);

    let response = call(
        &app,
        request(Method::POST, "/message?sessionId=a&sessionId=b", None, Some(&tools_list(1))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["error"]["code"], -32600);
}
