//! librechat-client-mcp: MCP server for the LibreChat client package
//!
//! This library exposes the `packages/client` directory of the LibreChat
//! repository to AI assistants over the Model Context Protocol, reading it
//! straight from GitHub instead of a local clone.
//!
//! # Architecture
//!
//! ```text
//! transport (stdio | sse | http) ──▶ mcp::McpServer (one per session)
//!                                          │
//!                                          ▼
//!                                   repo::Repository ──▶ cache ──▶ resilience ──▶ github
//! ```
//!
//! Sessions are isolated from one another. The response cache and the
//! rate-limit state are the only values they share.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Configuration and startup errors
//! - [`github`]: Remote data source client
//! - [`resilience`]: Retry with backoff and sequential fallback
//! - [`cache`]: TTL response cache with request coalescing
//! - [`repo`]: Package operations and the directory tree builder
//! - [`mcp`]: MCP protocol, dispatcher and catalogs
//! - [`transport`]: Session registry and transport bindings

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod mcp;
pub mod repo;
pub mod resilience;
pub mod transport;
