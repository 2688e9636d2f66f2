//! Integration tests for MCP protocol handling.
//!
//! These tests drive a full [`McpServer`] over an in-memory repository and
//! check the JSON-RPC replies a client would see.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{initialize_request, ready_server, repository, send, tool_call, SpySource};
use librechat_client_mcp::mcp::protocol::{parse_message, IncomingMessage, RequestId};
use librechat_client_mcp::mcp::McpServer;

fn text_of(reply: &Value) -> &str {
    reply["result"]["content"][0]["text"].as_str().unwrap_or_default()
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = initialize_request(1).to_string();

    let IncomingMessage::Request(req) = parse_message(&json).unwrap() else {
        panic!("Expected Request");
    };
    assert_eq!(req.method, "initialize");
    assert_eq!(req.id, RequestId::Number(1));
}

#[test]
fn test_parse_notification() {
    let json = r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#;

    let IncomingMessage::Notification(notif) = parse_message(json).unwrap() else {
        panic!("Expected Notification");
    };
    assert_eq!(notif.method, "notifications/initialized");
}

#[test]
fn test_parse_invalid_json() {
    assert!(parse_message("not valid json").is_err());
}

#[test]
fn test_parse_missing_jsonrpc_version() {
    assert!(parse_message(r#"{"id": 1, "method": "test"}"#).is_err());
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_handshake_then_catalogs() {
    let repo = repository(Arc::new(SpySource::librechat()));
    let mut server = McpServer::new(repo);

    let init = send(&mut server, &initialize_request(1)).await.unwrap();
    assert_eq!(init["result"]["serverInfo"]["name"], "librechat-client-mcp");
    assert!(init["result"]["capabilities"]["tools"].is_object());
    assert!(init["result"]["capabilities"]["prompts"].is_object());

    let early = send(&mut server, &json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .await
        .unwrap();
    assert_eq!(early["error"]["code"], -32600);

    assert!(send(&mut server, &common::initialized_notification()).await.is_none());

    let tools = send(&mut server, &json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}))
        .await
        .unwrap();
    let names: Vec<&str> = tools["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names.len(), 18);
    for expected in ["get_source_file", "get_directory_structure", "clear_cache", "search_code"] {
        assert!(names.contains(&expected), "missing {expected}");
    }

    let prompts = send(&mut server, &json!({"jsonrpc": "2.0", "id": 4, "method": "prompts/list"}))
        .await
        .unwrap();
    assert_eq!(prompts["result"]["prompts"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_sessions_do_not_share_lifecycle_state() {
    let repo = repository(Arc::new(SpySource::librechat()));
    let mut ready = ready_server(Arc::clone(&repo)).await;
    let mut fresh = McpServer::new(repo);

    let ok = send(&mut ready, &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await
        .unwrap();
    assert!(ok.get("result").is_some());

    let rejected = send(&mut fresh, &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
        .await
        .unwrap();
    assert_eq!(rejected["error"]["code"], -32600);
}

// =============================================================================
// Dispatcher Tests
// =============================================================================

#[tokio::test]
async fn test_get_hook_returns_source_text() {
    let repo = repository(Arc::new(SpySource::librechat()));
    let mut server = ready_server(repo).await;

    let reply = send(&mut server, &tool_call(5, "get_hook", json!({"hookName": "useAuth"})))
        .await
        .unwrap();
    assert_eq!(reply["id"], 5);
    assert_eq!(reply["result"]["content"][0]["type"], "text");
    assert_eq!(text_of(&reply), "export function useAuth() {}");
}

#[tokio::test]
async fn test_component_prefers_tsx() {
    let source = Arc::new(SpySource::librechat());
    let mut server = ready_server(repository(Arc::clone(&source))).await;

    let reply = send(
        &mut server,
        &tool_call(1, "get_component", json!({"componentPath": "Button"})),
    )
    .await
    .unwrap();
    assert_eq!(text_of(&reply), "export const Button = () => null;");
    assert_eq!(
        source.calls(),
        vec!["file:packages/client/src/components/Button.tsx"]
    );
}

#[tokio::test]
async fn test_missing_required_argument_makes_no_remote_call() {
    let source = Arc::new(SpySource::librechat());
    let mut server = ready_server(repository(Arc::clone(&source))).await;

    let reply = send(&mut server, &tool_call(6, "get_source_file", json!({})))
        .await
        .unwrap();
    assert_eq!(reply["error"]["code"], -32602);
    assert_eq!(reply["error"]["data"]["kind"], "validation");
    assert!(reply["error"]["message"]
        .as_str()
        .unwrap()
        .contains("filePath"));
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_tool_is_invalid_params() {
    let source = Arc::new(SpySource::librechat());
    let mut server = ready_server(repository(Arc::clone(&source))).await;

    let reply = send(&mut server, &tool_call(7, "rm_rf", json!({}))).await.unwrap();
    assert_eq!(reply["error"]["code"], -32602);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn test_not_found_carries_kind_and_operation() {
    let mut server = ready_server(repository(Arc::new(SpySource::librechat()))).await;

    let reply = send(
        &mut server,
        &tool_call(8, "get_source_file", json!({"filePath": "src/nope.ts"})),
    )
    .await
    .unwrap();
    assert_eq!(reply["error"]["code"], -32002);
    assert_eq!(reply["error"]["data"]["kind"], "not_found");
    assert_eq!(reply["error"]["data"]["operation"], "get_source_file");
    assert!(reply["error"]["message"]
        .as_str()
        .unwrap()
        .contains("packages/client/src/nope.ts"));
}

#[tokio::test]
async fn test_json_results_are_pretty_text() {
    let mut server = ready_server(repository(Arc::new(SpySource::librechat()))).await;

    let reply = send(&mut server, &tool_call(9, "get_package_info", json!({})))
        .await
        .unwrap();
    let text = text_of(&reply);
    assert!(text.contains('\n'));
    let value: Value = serde_json::from_str(text).unwrap();
    assert_eq!(value["name"], "@librechat/client");
}

#[tokio::test]
async fn test_directory_structure_tree() {
    let mut server = ready_server(repository(Arc::new(SpySource::librechat()))).await;

    let reply = send(&mut server, &tool_call(10, "get_directory_structure", json!({})))
        .await
        .unwrap();
    let tree: Value = serde_json::from_str(text_of(&reply)).unwrap();
    assert_eq!(tree["type"], "directory");
    assert_eq!(tree["path"], "packages/client");
    let hooks = &tree["children"]["src"]["children"]["hooks"];
    assert_eq!(hooks["children"]["useAuth.ts"]["type"], "file");
}

#[tokio::test]
async fn test_cache_serves_repeat_reads_until_cleared() {
    let source = Arc::new(SpySource::librechat());
    let mut server = ready_server(repository(Arc::clone(&source))).await;
    let read = tool_call(11, "get_index", json!({}));

    send(&mut server, &read).await.unwrap();
    send(&mut server, &read).await.unwrap();
    assert_eq!(source.calls().len(), 1);

    let cleared = send(&mut server, &tool_call(12, "clear_cache", json!({"prefix": "file:"})))
        .await
        .unwrap();
    let body: Value = serde_json::from_str(text_of(&cleared)).unwrap();
    assert_eq!(body, json!({"cleared": 1, "scope": "file:"}));

    send(&mut server, &read).await.unwrap();
    assert_eq!(source.calls().len(), 2);

    let cleared = send(&mut server, &tool_call(13, "clear_cache", json!({})))
        .await
        .unwrap();
    let body: Value = serde_json::from_str(text_of(&cleared)).unwrap();
    assert_eq!(body, json!({"cleared": "all", "scope": "full"}));
}

#[tokio::test]
async fn test_batch_fetch_reports_each_path() {
    let mut server = ready_server(repository(Arc::new(SpySource::librechat()))).await;

    let reply = send(
        &mut server,
        &tool_call(
            14,
            "get_source_files",
            json!({"filePaths": ["src/index.ts", "src/missing.ts"]}),
        ),
    )
    .await
    .unwrap();
    let body: Value = serde_json::from_str(text_of(&reply)).unwrap();
    assert_eq!(body["src/index.ts"]["status"], "success");
    assert_eq!(body["src/missing.ts"]["status"], "error");
}

#[tokio::test]
async fn test_resource_read() {
    let mut server = ready_server(repository(Arc::new(SpySource::librechat()))).await;

    let reply = send(
        &mut server,
        &json!({
            "jsonrpc": "2.0",
            "id": 15,
            "method": "resources/read",
            "params": {"uri": "resource:get_modules"}
        }),
    )
    .await
    .unwrap();
    let contents = &reply["result"]["contents"][0];
    assert_eq!(contents["mimeType"], "application/json");
    let modules: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(modules["hooks"]["path"], "packages/client/src/hooks");
}
