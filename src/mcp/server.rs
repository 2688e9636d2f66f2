//! MCP server for one session.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool, resource and prompt requests
//! 3. **Shutdown**: Handled by the owning transport
//!
//! An [`McpServer`] holds no I/O of its own. Each transport feeds it parsed
//! lines and delivers whatever reply it returns, so every session gets an
//! independent lifecycle while all of them share one [`Repository`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, RequestId,
    MCP_PROTOCOL_VERSION, SERVER_NAME, SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::mcp::validation::{validate_arguments, FieldRule};
use crate::mcp::{prompts, resources, tools};
use crate::repo::Repository;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    pub tools: ListCapability,
    pub resources: ListCapability,
    pub prompts: ListCapability,
}

/// Capability flags shared by tools, resources and prompts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListCapability {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool, so we must take &bool here
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

const TOOL_CALL_RULES: &[FieldRule] = &[FieldRule::required("name", "Tool name", 1, 200)];
const READ_RESOURCE_RULES: &[FieldRule] = &[FieldRule::required("uri", "Resource URI", 1, 1000)];
const GET_PROMPT_RULES: &[FieldRule] = &[FieldRule::required("name", "Prompt name", 1, 200)];

/// The MCP server state machine for a single session.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    /// Name reported by the client, for logging.
    client_name: Option<String>,
    /// Shared repository access.
    repository: Arc<Repository>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("state", &self.state)
            .field("protocol_version", &self.protocol_version)
            .field("client_name", &self.client_name)
            .finish_non_exhaustive()
    }
}

impl McpServer {
    /// Creates a server in the `AwaitingInit` state.
    #[must_use]
    pub fn new(repository: Arc<Repository>) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            protocol_version: None,
            client_name: None,
            repository,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Negotiated protocol version, once initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Handles one framed message and returns the reply, if any.
    pub async fn handle_line(&mut self, line: &str) -> Option<OutgoingMessage> {
        match parse_message(line) {
            Ok(msg) => self.handle_message(msg).await,
            Err(error) => Some(error.into()),
        }
    }

    /// Handles a parsed incoming message.
    pub async fn handle_message(&mut self, msg: IncomingMessage) -> Option<OutgoingMessage> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await),
            IncomingMessage::Notification(ref notif) => {
                self.handle_notification(notif);
                None
            }
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: JsonRpcRequest) -> OutgoingMessage {
        debug!(method = %req.method, id = %req.id, "Handling request");
        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "ping" => Ok(Self::handle_ping(&req)),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req).await,
            "resources/list" => self.handle_resources_list(&req),
            "resources/templates/list" => self.handle_resource_templates_list(&req),
            "resources/read" => self.handle_resources_read(&req),
            "prompts/list" => self.handle_prompts_list(&req),
            "prompts/get" => self.handle_prompts_get(&req),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => resp.into(),
            Err(error) => error.into(),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" if self.state == ServerState::Initialising => {
                self.state = ServerState::Running;
                info!(client = self.client_name.as_deref().unwrap_or("unknown"), "Session ready");
            }
            "notifications/cancelled" => debug!("Ignoring cancellation notification"),
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::INVALID_REQUEST,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = parse_params(req, "initialize")?;

        let negotiated_version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
            params.protocol_version.clone()
        } else {
            warn!(
                requested = %params.protocol_version,
                offered = MCP_PROTOCOL_VERSION,
                "Client requested an unsupported protocol version"
            );
            MCP_PROTOCOL_VERSION.to_string()
        };

        self.client_name = params.client_info.map(|c| c.name);
        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the ping request.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    // ==================== Tools ====================

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tools::definitions() }),
        ))
    }

    async fn handle_tools_call(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        check_params(req, TOOL_CALL_RULES)?;
        let params: tools::ToolCallParams = parse_params(req, "tool call")?;

        match tools::call_tool(&self.repository, &params.name, &params.arguments).await {
            Ok(result) => {
                let value = serde_json::to_value(&result).map_err(|e| {
                    tracing::error!(error = %e, "Failed to serialise tool call result");
                    JsonRpcError::internal_error(req.id.clone(), "Internal error: failed to serialise result")
                })?;
                Ok(JsonRpcResponse::success(req.id.clone(), value))
            }
            Err(err) => {
                warn!(tool = %params.name, kind = err.kind(), error = %err, "Tool call failed");
                Err(err.into_rpc(req.id.clone(), &params.name))
            }
        }
    }

    // ==================== Resources ====================

    fn handle_resources_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resources": resources::definitions() }),
        ))
    }

    fn handle_resource_templates_list(
        &self,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "resourceTemplates": resources::template_definitions() }),
        ))
    }

    fn handle_resources_read(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        check_params(req, READ_RESOURCE_RULES)?;
        let params: ReadResourceParams = parse_params(req, "resource read")?;

        let contents = resources::read(&params.uri, self.repository.layout()).ok_or_else(|| {
            JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::NOT_FOUND,
                    format!("Resource not found: {}", params.uri),
                )
                .with_data(json!({ "kind": "not_found", "operation": "resources/read" })),
            )
        })?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "contents": [contents] }),
        ))
    }

    // ==================== Prompts ====================

    fn handle_prompts_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "prompts": prompts::definitions() }),
        ))
    }

    fn handle_prompts_get(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;
        check_params(req, GET_PROMPT_RULES)?;
        let params: GetPromptParams = parse_params(req, "prompt")?;

        let result = prompts::get(&params.name, &params.arguments)
            .map_err(|e| JsonRpcError::invalid_params(req.id.clone(), e.to_string()))?;
        let value = serde_json::to_value(result)
            .map_err(|e| JsonRpcError::internal_error(req.id.clone(), e.to_string()))?;
        Ok(JsonRpcResponse::success(req.id.clone(), value))
    }

    /// Ensures the server is in the Running state.
    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::INVALID_REQUEST, "Server not initialised"),
            ));
        }
        Ok(())
    }
}

/// Validates request params against field rules before deserialising them.
fn check_params(req: &JsonRpcRequest, rules: &[FieldRule]) -> Result<(), JsonRpcError> {
    let params = req.params.clone().unwrap_or(Value::Null);
    validate_arguments(rules, &params)
        .map(|_| ())
        .map_err(|e| {
            JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::INVALID_PARAMS, e.to_string())
                    .with_data(json!({ "kind": "validation", "operation": req.method })),
            )
        })
}

fn parse_params<T: serde::de::DeserializeOwned>(req: &JsonRpcRequest, what: &str) -> Result<T, JsonRpcError> {
    req.params
        .as_ref()
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| JsonRpcError::invalid_params(req.id.clone(), format!("Invalid {what} params: {e}")))?
        .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), format!("Missing {what} params")))
}
