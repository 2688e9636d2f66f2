//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing the LibreChat
//! client package as tools, resources and prompts to AI assistants. Messages
//! are JSON-RPC 2.0; framing and delivery belong to [`crate::transport`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     McpServer (per session)                 │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Protocol   │───▶│  Lifecycle  │───▶│   Tools     │    │
//! │   │  (parsing)  │    │  & dispatch │    │ (validated) │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │                             │                  │            │
//! │                             ▼                  ▼            │
//! │                   Resources, Prompts      Repository        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2025-03-26 and accepts
//! clients speaking 2024-11-05.

pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;
pub mod validation;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, MCP_PROTOCOL_VERSION};
pub use server::McpServer;
