//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use librechat_client_mcp::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use librechat_client_mcp::github::{
    CodeSearchResults, DirectoryListing, EntryKind, RateLimitInfo, RateLimitState, RepoEntry,
    RepoSource, SourceError,
};
use librechat_client_mcp::mcp::McpServer;
use librechat_client_mcp::repo::{PackageLayout, Repository};
use librechat_client_mcp::resilience::RetryPolicy;

/// In-memory repository that records every remote call.
#[derive(Default)]
pub struct SpySource {
    files: HashMap<String, String>,
    dirs: HashMap<String, Vec<RepoEntry>>,
    calls: Mutex<Vec<String>>,
}

impl SpySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn with_dir(mut self, path: &str, entries: &[(&str, EntryKind)]) -> Self {
        let entries = entries
            .iter()
            .map(|(name, kind)| RepoEntry {
                name: (*name).to_string(),
                path: format!("{path}/{name}"),
                kind: *kind,
                size: 10,
                download_url: None,
                sha: None,
            })
            .collect();
        self.dirs.insert(path.to_string(), entries);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// The LibreChat client package with a couple of hooks and components.
    pub fn librechat() -> Self {
        Self::new()
            .with_file("packages/client/package.json", r#"{"name": "@librechat/client"}"#)
            .with_file("packages/client/src/index.ts", "export * from './hooks';")
            .with_file(
                "packages/client/src/hooks/useAuth.ts",
                "export function useAuth() {}",
            )
            .with_file(
                "packages/client/src/components/Button.tsx",
                "export const Button = () => null;",
            )
            .with_dir(
                "packages/client",
                &[("package.json", EntryKind::File), ("src", EntryKind::Dir)],
            )
            .with_dir(
                "packages/client/src",
                &[("index.ts", EntryKind::File), ("hooks", EntryKind::Dir)],
            )
            .with_dir("packages/client/src/hooks", &[("useAuth.ts", EntryKind::File)])
    }
}

#[async_trait]
impl RepoSource for SpySource {
    async fn fetch_raw_file(&self, path: &str) -> Result<String, SourceError> {
        self.calls.lock().push(format!("file:{path}"));
        self.files.get(path).cloned().ok_or_else(|| SourceError::NotFound {
            what: "File",
            path: path.to_string(),
        })
    }

    async fn list_directory(&self, path: &str) -> Result<DirectoryListing, SourceError> {
        self.calls.lock().push(format!("dir:{path}"));
        self.dirs
            .get(path)
            .cloned()
            .map(DirectoryListing::Directory)
            .ok_or_else(|| SourceError::NotFound {
                what: "Directory",
                path: path.to_string(),
            })
    }

    async fn query_rate_limit(&self) -> Result<RateLimitInfo, SourceError> {
        self.calls.lock().push("rate_limit".to_string());
        Ok(RateLimitInfo {
            limit: 5000,
            remaining: 4999,
            reset: 1_700_000_000,
            used: 1,
        })
    }

    async fn search_code(&self, query: &str) -> Result<CodeSearchResults, SourceError> {
        self.calls.lock().push(format!("search:{query}"));
        Ok(CodeSearchResults::default())
    }
}

pub fn repository(source: Arc<SpySource>) -> Arc<Repository> {
    Arc::new(Repository::new(
        source,
        PackageLayout::librechat(),
        DEFAULT_TTL,
        DEFAULT_MAX_ENTRIES,
        RetryPolicy::default(),
        Arc::new(RateLimitState::new()),
    ))
}

pub fn initialize_request(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": { "name": "test-client", "version": "1.0.0" }
        }
    })
}

pub fn initialized_notification() -> Value {
    json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })
}

pub fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

/// Sends one message and parses the reply.
pub async fn send(server: &mut McpServer, message: &Value) -> Option<Value> {
    let reply = server.handle_line(&message.to_string()).await?;
    serde_json::from_str(&reply.to_json().ok()?).ok()
}

/// A server that has completed the handshake.
pub async fn ready_server(repository: Arc<Repository>) -> McpServer {
    let mut server = McpServer::new(repository);
    send(&mut server, &initialize_request(0)).await;
    send(&mut server, &initialized_notification()).await;
    server
}
