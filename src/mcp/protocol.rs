//! JSON-RPC 2.0 framing for the MCP server.
//!
//! Incoming lines become an [`IncomingMessage`]: a request when the object
//! carries an `id`, a notification otherwise. Everything the server sends
//! back is an [`OutgoingMessage`]. Error codes outside the standard range
//! are the server's own and are listed on [`ErrorCode`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The latest MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// Every protocol version the server accepts, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 2] = [MCP_PROTOCOL_VERSION, "2024-11-05"];

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "librechat-client-mcp";

const JSONRPC_VERSION: &str = "2.0";

/// Request id. MCP allows strings and integers, never `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A call that expects a reply.
#[derive(Debug, Clone)]
pub struct JsonRpcRequest {
    pub id: RequestId,
    pub method: String,
    /// `None` when absent or `null`.
    pub params: Option<Value>,
}

/// A one-way message.
#[derive(Debug, Clone)]
pub struct JsonRpcNotification {
    pub method: String,
    pub params: Option<Value>,
}

/// A parsed incoming line.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Numeric JSON-RPC error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(i32);

impl ErrorCode {
    pub const PARSE_ERROR: Self = Self(-32700);
    pub const INVALID_REQUEST: Self = Self(-32600);
    pub const METHOD_NOT_FOUND: Self = Self(-32601);
    pub const INVALID_PARAMS: Self = Self(-32602);
    pub const INTERNAL_ERROR: Self = Self(-32603);
    /// The addressed session does not exist or has been closed.
    pub const SESSION_NOT_FOUND: Self = Self(-32000);
    /// GitHub answered with an unexpected failure.
    pub const REMOTE_ERROR: Self = Self(-32001);
    /// The requested file or directory does not exist.
    pub const NOT_FOUND: Self = Self(-32002);
    /// The GitHub API quota is exhausted.
    pub const RATE_LIMITED: Self = Self(-32003);

    /// Wire value.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }
}

/// The `error` member of an error reply.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured detail, e.g. `{"kind", "operation"}`.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Successful reply.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    jsonrpc: &'static str,
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcResponse {
    #[must_use]
    pub const fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// Error reply. `id` is `null` when the request id could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    #[must_use]
    pub const fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }

    /// The line was not JSON, or not UTF-8.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorData::with_message(ErrorCode::PARSE_ERROR, "Parse error"))
    }

    fn invalid_request(id: Option<RequestId>, reason: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::INVALID_REQUEST, format!("Invalid Request: {reason}")),
        )
    }

    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::METHOD_NOT_FOUND, format!("Method not found: {method}")),
        )
    }

    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(Some(id), JsonRpcErrorData::with_message(ErrorCode::INVALID_PARAMS, message))
    }

    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(Some(id), JsonRpcErrorData::with_message(ErrorCode::INTERNAL_ERROR, message))
    }
}

/// A reply to be delivered to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutgoingMessage {
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl OutgoingMessage {
    /// Single-line JSON, ready for any transport.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<JsonRpcResponse> for OutgoingMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for OutgoingMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

/// Returns `true` when `value` is an `initialize` request.
#[must_use]
pub fn is_initialize_request(value: &Value) -> bool {
    value.get("method").and_then(Value::as_str) == Some("initialize") && value.get("id").is_some()
}

/// Parses one framed message.
///
/// # Errors
///
/// Malformed JSON yields a parse error with a `null` id. A JSON value that
/// is not a valid JSON-RPC 2.0 message yields an invalid request error,
/// carrying the id when one could be read.
pub fn parse_message(line: &str) -> Result<IncomingMessage, JsonRpcError> {
    let value: Value = serde_json::from_str(line).map_err(|_| JsonRpcError::parse_error())?;
    let Value::Object(mut fields) = value else {
        return Err(JsonRpcError::invalid_request(None, "expected an object"));
    };

    let id = take_id(&mut fields)?;
    if fields.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(JsonRpcError::invalid_request(id, "jsonrpc must be \"2.0\""));
    }
    let method = match fields.remove("method") {
        Some(Value::String(method)) if !method.is_empty() => method,
        _ => return Err(JsonRpcError::invalid_request(id, "method must be a non-empty string")),
    };
    let params = fields.remove("params").filter(|p| !p.is_null());

    Ok(match id {
        Some(id) => IncomingMessage::Request(JsonRpcRequest { id, method, params }),
        None => IncomingMessage::Notification(JsonRpcNotification { method, params }),
    })
}

fn take_id(fields: &mut Map<String, Value>) -> Result<Option<RequestId>, JsonRpcError> {
    match fields.remove("id") {
        None => Ok(None),
        Some(raw) => serde_json::from_value(raw)
            .map(Some)
            .map_err(|_| JsonRpcError::invalid_request(None, "id must be a string or an integer")),
    }
}
