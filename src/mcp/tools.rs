//! Tool catalog and dispatch.
//!
//! A call moves through four steps: the tool is looked up by name, its
//! arguments are validated against the tool's [`FieldRule`]s, the handler
//! runs against the [`Repository`], and the output is normalised into a
//! [`ToolCallResult`]. Nothing reaches the repository before validation
//! succeeds.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::github::SourceError;
use crate::mcp::protocol::{ErrorCode, JsonRpcError, JsonRpcErrorData, RequestId};
use crate::mcp::validation::{input_schema, validate_arguments, FieldRule, ValidationError};
use crate::repo::{ClearScope, Repository, SourceKind};

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
        }
    }

    /// Text of the first content item.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|ToolContent::Text { text }| text.as_str())
    }
}

/// Errors raised while dispatching a tool call.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments violated the tool's rules.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No tool with this name exists.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The remote source failed.
    #[error("{context}: {source}")]
    Source {
        /// Operation that failed, e.g. "Failed to get hook".
        context: &'static str,
        source: SourceError,
    },

    /// Anything else. The detail is logged, never sent to the client.
    #[error("{context}: internal error")]
    Internal {
        context: &'static str,
        detail: String,
    },
}

impl ToolError {
    /// JSON-RPC error code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) | Self::UnknownTool(_) => ErrorCode::INVALID_PARAMS,
            Self::Source { source, .. } => match source {
                SourceError::NotFound { .. } | SourceError::NotADirectory { .. } => {
                    ErrorCode::NOT_FOUND
                }
                SourceError::RateLimited { .. } => ErrorCode::RATE_LIMITED,
                SourceError::Status { .. }
                | SourceError::Connection { .. }
                | SourceError::InvalidResponse { .. } => ErrorCode::REMOTE_ERROR,
            },
            Self::Internal { .. } => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// Machine-readable error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownTool(_) => "unknown_tool",
            Self::Source { source, .. } => source.kind(),
            Self::Internal { .. } => "internal",
        }
    }

    /// Converts into a JSON-RPC error reply for `id`.
    #[must_use]
    pub fn into_rpc(self, id: RequestId, tool: &str) -> JsonRpcError {
        let data = json!({ "kind": self.kind(), "operation": tool });
        JsonRpcError::new(
            Some(id),
            JsonRpcErrorData::with_message(self.code(), self.to_string()).with_data(data),
        )
    }
}

// ==================== Catalog ====================

const FILE_PATH_MAX: usize = 500;
const NAME_MAX: usize = 200;

const GET_SOURCE_FILE: &[FieldRule] = &[FieldRule::required(
    "filePath",
    "Path to the source file within the LibreChat Client package",
    1,
    FILE_PATH_MAX,
)];
const GET_SOURCE_FILES: &[FieldRule] = &[FieldRule::list(
    "filePaths",
    "Array of file paths to fetch",
    1,
    20,
    FILE_PATH_MAX,
)];
const LIST_FILES: &[FieldRule] = &[FieldRule::optional(
    "directory",
    "Directory path within the repository",
    FILE_PATH_MAX,
)];
const GET_DIRECTORY_STRUCTURE: &[FieldRule] = &[FieldRule::optional(
    "path",
    "Path within the repository",
    FILE_PATH_MAX,
)];
const GET_HOOK: &[FieldRule] = &[FieldRule::required(
    "hookName",
    "Name of the hook file (e.g., 'useConversation', 'useAuth')",
    1,
    NAME_MAX,
)];
const GET_COMPONENT: &[FieldRule] = &[FieldRule::required(
    "componentPath",
    "Path to the component within src/components/",
    1,
    300,
)];
const LIST_COMPONENTS: &[FieldRule] = &[FieldRule::optional(
    "subdir",
    "Subdirectory within components to list",
    NAME_MAX,
)];
const GET_PROVIDER: &[FieldRule] = &[FieldRule::required(
    "providerName",
    "Name of the provider",
    1,
    NAME_MAX,
)];
const GET_UTIL: &[FieldRule] = &[FieldRule::required(
    "utilName",
    "Name of the utility file",
    1,
    NAME_MAX,
)];
const CLEAR_CACHE: &[FieldRule] = &[FieldRule::optional(
    "prefix",
    "Optional cache key prefix to clear (e.g., \"file:\" for files, \"dir:\" for directories). \
     Omit to clear entire cache.",
    100,
)];
const SEARCH_CODE: &[FieldRule] = &[
    FieldRule::required(
        "query",
        "Search query string (e.g., \"useEffect\", \"interface ChatMessage\")",
        1,
        500,
    ),
    FieldRule::optional(
        "extension",
        "Optional file extension filter (e.g., \"ts\", \"tsx\", \"json\")",
        20,
    ),
];
const NO_ARGUMENTS: &[FieldRule] = &[];

/// Every tool the server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GetSourceFile,
    GetSourceFiles,
    ListFiles,
    GetDirectoryStructure,
    GetHook,
    ListHooks,
    GetComponent,
    ListComponents,
    GetProvider,
    ListProviders,
    GetUtil,
    ListUtils,
    GetPackageInfo,
    GetStore,
    GetIndex,
    GetRateLimit,
    ClearCache,
    SearchCode,
}

impl Tool {
    /// Catalog order.
    pub const ALL: [Self; 18] = [
        Self::GetSourceFile,
        Self::GetSourceFiles,
        Self::ListFiles,
        Self::GetDirectoryStructure,
        Self::GetHook,
        Self::ListHooks,
        Self::GetComponent,
        Self::ListComponents,
        Self::GetProvider,
        Self::ListProviders,
        Self::GetUtil,
        Self::ListUtils,
        Self::GetPackageInfo,
        Self::GetStore,
        Self::GetIndex,
        Self::GetRateLimit,
        Self::ClearCache,
        Self::SearchCode,
    ];

    /// Looks a tool up by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetSourceFile => "get_source_file",
            Self::GetSourceFiles => "get_source_files",
            Self::ListFiles => "list_files",
            Self::GetDirectoryStructure => "get_directory_structure",
            Self::GetHook => "get_hook",
            Self::ListHooks => "list_hooks",
            Self::GetComponent => "get_component",
            Self::ListComponents => "list_components",
            Self::GetProvider => "get_provider",
            Self::ListProviders => "list_providers",
            Self::GetUtil => "get_util",
            Self::ListUtils => "list_utils",
            Self::GetPackageInfo => "get_package_info",
            Self::GetStore => "get_store",
            Self::GetIndex => "get_index",
            Self::GetRateLimit => "get_rate_limit",
            Self::ClearCache => "clear_cache",
            Self::SearchCode => "search_code",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::GetSourceFile => "Get the source code for any file in the LibreChat Client package",
            Self::GetSourceFiles => {
                "Fetch multiple source files in parallel. Returns results keyed by file path \
                 with individual success/failure status."
            }
            Self::ListFiles => "List files in a directory within the LibreChat monorepo",
            Self::GetDirectoryStructure => {
                "Get the full directory tree structure of the LibreChat Client package"
            }
            Self::GetHook => "Get the source code of a React hook from src/hooks/",
            Self::ListHooks => "List all available React hooks in the LibreChat Client package",
            Self::GetComponent => "Get the source code of a React component",
            Self::ListComponents => "List component files/directories",
            Self::GetProvider => "Get the source code of a React context provider",
            Self::ListProviders => "List all context providers in the LibreChat Client package",
            Self::GetUtil => "Get the source code of a utility function from src/utils/",
            Self::ListUtils => "List all utility files in the LibreChat Client package",
            Self::GetPackageInfo => "Get the package.json of the LibreChat Client package",
            Self::GetStore => "Get the store.ts file containing state management configuration",
            Self::GetIndex => "Get the main index.ts entry point showing all package exports",
            Self::GetRateLimit => "Get the current GitHub API rate limit status",
            Self::ClearCache => {
                "Clear the server cache. Optionally specify a prefix to clear only matching entries."
            }
            Self::SearchCode => {
                "Search for code in the LibreChat Client package using GitHub Code Search API"
            }
        }
    }

    /// Argument rules.
    #[must_use]
    pub const fn fields(self) -> &'static [FieldRule] {
        match self {
            Self::GetSourceFile => GET_SOURCE_FILE,
            Self::GetSourceFiles => GET_SOURCE_FILES,
            Self::ListFiles => LIST_FILES,
            Self::GetDirectoryStructure => GET_DIRECTORY_STRUCTURE,
            Self::GetHook => GET_HOOK,
            Self::GetComponent => GET_COMPONENT,
            Self::ListComponents => LIST_COMPONENTS,
            Self::GetProvider => GET_PROVIDER,
            Self::GetUtil => GET_UTIL,
            Self::ClearCache => CLEAR_CACHE,
            Self::SearchCode => SEARCH_CODE,
            Self::ListHooks
            | Self::ListProviders
            | Self::ListUtils
            | Self::GetPackageInfo
            | Self::GetStore
            | Self::GetIndex
            | Self::GetRateLimit => NO_ARGUMENTS,
        }
    }

    /// Prefix for error messages raised by this tool.
    const fn failure_context(self) -> &'static str {
        match self {
            Self::GetSourceFile => "Failed to get source file",
            Self::GetSourceFiles => "Failed to batch fetch files",
            Self::ListFiles => "Failed to list files",
            Self::GetDirectoryStructure => "Failed to get directory structure",
            Self::GetHook => "Failed to get hook",
            Self::ListHooks => "Failed to list hooks",
            Self::GetComponent => "Failed to get component",
            Self::ListComponents => "Failed to list components",
            Self::GetProvider => "Failed to get provider",
            Self::ListProviders => "Failed to list providers",
            Self::GetUtil => "Failed to get util",
            Self::ListUtils => "Failed to list utils",
            Self::GetPackageInfo => "Failed to get package info",
            Self::GetStore => "Failed to get store",
            Self::GetIndex => "Failed to get index",
            Self::GetRateLimit => "Failed to get rate limit info",
            Self::ClearCache => "Failed to clear cache",
            Self::SearchCode => "Failed to search code",
        }
    }

    /// Definition advertised in `tools/list`.
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: input_schema(self.fields()),
        }
    }

    fn source_error(self, source: SourceError) -> ToolError {
        ToolError::Source {
            context: self.failure_context(),
            source,
        }
    }

    fn json<T: Serialize>(self, value: &T) -> Result<ToolOutput, ToolError> {
        serde_json::to_value(value)
            .map(ToolOutput::Json)
            .map_err(|e| ToolError::Internal {
                context: self.failure_context(),
                detail: e.to_string(),
            })
    }

    async fn execute(self, repo: &Repository, args: &Arguments) -> Result<ToolOutput, ToolError> {
        let fail = |source: SourceError| self.source_error(source);
        let output = match self {
            Self::GetSourceFile => {
                ToolOutput::text(&repo.file(args.required("filePath")?).await.map_err(fail)?)
            }
            Self::GetSourceFiles => {
                ToolOutput::Json(Value::Object(repo.source_files(&args.list("filePaths")).await))
            }
            Self::ListFiles => self.json(&repo.list_files(args.text("directory")).await.map_err(fail)?)?,
            Self::GetDirectoryStructure => {
                self.json(&repo.directory_tree(args.text("path")).await.map_err(fail)?)?
            }
            Self::GetHook => ToolOutput::text(
                &repo
                    .named_source(SourceKind::Hook, args.required("hookName")?)
                    .await
                    .map_err(fail)?,
            ),
            Self::ListHooks => self.json(&repo.list_kind(SourceKind::Hook, None).await.map_err(fail)?)?,
            Self::GetComponent => ToolOutput::text(
                &repo
                    .named_source(SourceKind::Component, args.required("componentPath")?)
                    .await
                    .map_err(fail)?,
            ),
            Self::ListComponents => self.json(
                &repo
                    .list_kind(SourceKind::Component, args.text("subdir"))
                    .await
                    .map_err(fail)?,
            )?,
            Self::GetProvider => ToolOutput::text(
                &repo
                    .named_source(SourceKind::Provider, args.required("providerName")?)
                    .await
                    .map_err(fail)?,
            ),
            Self::ListProviders => {
                self.json(&repo.list_kind(SourceKind::Provider, None).await.map_err(fail)?)?
            }
            Self::GetUtil => ToolOutput::text(
                &repo
                    .named_source(SourceKind::Util, args.required("utilName")?)
                    .await
                    .map_err(fail)?,
            ),
            Self::ListUtils => self.json(&repo.list_kind(SourceKind::Util, None).await.map_err(fail)?)?,
            Self::GetPackageInfo => ToolOutput::Json(repo.package_info().await.map_err(fail)?),
            Self::GetStore => ToolOutput::text(&repo.store().await.map_err(fail)?),
            Self::GetIndex => ToolOutput::text(&repo.index().await.map_err(fail)?),
            Self::GetRateLimit => ToolOutput::Json(repo.rate_limit().await),
            Self::ClearCache => {
                let (cleared, scope) = repo.clear_cache(args.text("prefix")).await;
                ToolOutput::Json(match scope {
                    ClearScope::Prefix(prefix) => json!({ "cleared": cleared, "scope": prefix }),
                    ClearScope::Full => json!({ "cleared": "all", "scope": "full" }),
                })
            }
            Self::SearchCode => self.json(
                &repo
                    .search_code(args.required("query")?, args.text("extension"))
                    .await
                    .map_err(fail)?,
            )?,
        };
        Ok(output)
    }
}

/// Validated arguments of one call.
#[derive(Debug, Default)]
struct Arguments(Map<String, Value>);

impl Arguments {
    fn text(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// A field whose rule is `required`.
    fn required(&self, name: &str) -> Result<&str, ToolError> {
        self.text(name).ok_or_else(|| {
            ToolError::Validation(ValidationError {
                issues: vec![format!("{name}: \"{name}\" is required")],
            })
        })
    }

    fn list(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Handler output before normalisation.
#[derive(Debug)]
enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    fn into_result(self) -> Result<ToolCallResult, serde_json::Error> {
        match self {
            Self::Text(text) => Ok(ToolCallResult::text(text)),
            Self::Json(value) => serde_json::to_string_pretty(&value).map(ToolCallResult::text),
        }
    }
}

/// Definitions of every tool, in catalog order.
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    Tool::ALL.into_iter().map(Tool::definition).collect()
}

/// Validates and runs the tool `name`.
///
/// # Errors
///
/// Returns [`ToolError::UnknownTool`] or [`ToolError::Validation`] before any
/// remote access, and [`ToolError::Source`] when the repository fails.
pub async fn call_tool(repo: &Repository, name: &str, arguments: &Value) -> Result<ToolCallResult, ToolError> {
    let tool = Tool::from_name(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
    let args = Arguments(validate_arguments(tool.fields(), arguments)?);

    debug!(tool = tool.name(), "Executing tool");
    let output = tool.execute(repo, &args).await?;

    output.into_result().map_err(|e| {
        error!(tool = tool.name(), error = %e, "Failed to serialise tool output");
        ToolError::Internal {
            context: tool.failure_context(),
            detail: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::EntryKind;
    use crate::repo::testing::{repository, FakeSource};
    use std::sync::Arc;

    #[test]
    fn catalog_is_complete_and_unique() {
        let defs = definitions();
        assert_eq!(defs.len(), 18);
        let mut names: Vec<_> = defs.iter().map(|d| d.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 18);
        for def in &defs {
            assert!(def.input_schema.is_object());
            assert_eq!(Tool::from_name(&def.name).map(Tool::name), Some(def.name.as_str()));
        }
    }

    #[test]
    fn required_fields_appear_in_schema() {
        let schema = Tool::GetHook.definition().input_schema;
        assert_eq!(schema["required"], json!(["hookName"]));
        let schema = Tool::ListHooks.definition().input_schema;
        assert_eq!(schema["required"], json!([]));
    }

    #[tokio::test]
    async fn missing_argument_never_reaches_source() {
        let source = Arc::new(FakeSource::default());
        let repo = repository(Arc::clone(&source));
        let err = call_tool(&repo, "get_hook", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert_eq!(err.code(), ErrorCode::INVALID_PARAMS);
        assert!(source.calls().is_empty());
    }

    #[test]
    fn absent_required_argument_is_validation_error() {
        let args = Arguments(Map::new());
        let err = args.required("hookName").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: hookName: \"hookName\" is required"
        );
        assert_eq!(err.code(), ErrorCode::INVALID_PARAMS);

        let mut fields = Map::new();
        fields.insert("hookName".to_string(), json!("useAuth"));
        assert_eq!(Arguments(fields).required("hookName").unwrap(), "useAuth");
    }

    #[tokio::test]
    async fn unknown_tool() {
        let repo = repository(Arc::new(FakeSource::default()));
        let err = call_tool(&repo, "rm_rf", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: rm_rf");
        assert_eq!(err.kind(), "unknown_tool");
    }

    #[tokio::test]
    async fn text_output_is_verbatim() {
        let source = FakeSource::default().file("packages/client/src/hooks/useAuth.ts", "export const useAuth");
        let repo = repository(Arc::new(source));
        let result = call_tool(&repo, "get_hook", &json!({"hookName": "useAuth"}))
            .await
            .unwrap();
        assert_eq!(result.first_text(), Some("export const useAuth"));
    }

    #[tokio::test]
    async fn json_output_is_pretty_printed() {
        let source = FakeSource::default().dir(
            "packages/client/src/hooks",
            &[("useAuth.ts", EntryKind::File)],
        );
        let repo = repository(Arc::new(source));
        let result = call_tool(&repo, "list_hooks", &Value::Null).await.unwrap();
        let text = result.first_text().unwrap();
        assert!(text.contains('\n'));
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value[0]["name"], "useAuth.ts");
        assert!(value[0].get("sha").is_none());
    }

    #[tokio::test]
    async fn source_errors_carry_context_and_kind() {
        let repo = repository(Arc::new(FakeSource::default()));
        let err = call_tool(&repo, "get_hook", &json!({"hookName": "useNothing"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NOT_FOUND);
        assert!(err.to_string().starts_with("Failed to get hook: File not found"));

        let rpc = err.into_rpc(RequestId::Number(3), "get_hook");
        assert_eq!(rpc.error.code, -32002);
        assert_eq!(
            rpc.error.data,
            Some(json!({"kind": "not_found", "operation": "get_hook"}))
        );
    }

    #[tokio::test]
    async fn rate_limited_maps_to_dedicated_code() {
        let source = FakeSource::default().dir_error(
            "packages/client/src/utils",
            SourceError::RateLimited { reset: Some(5) },
        );
        let repo = repository(Arc::new(source));
        let err = call_tool(&repo, "list_utils", &json!({})).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RATE_LIMITED);
        assert!(err.to_string().contains("GITHUB_PERSONAL_ACCESS_TOKEN"));
    }

    #[tokio::test]
    async fn clear_cache_shapes() {
        let repo = repository(Arc::new(FakeSource::default()));
        let full = call_tool(&repo, "clear_cache", &json!({})).await.unwrap();
        let value: Value = serde_json::from_str(full.first_text().unwrap()).unwrap();
        assert_eq!(value, json!({"cleared": "all", "scope": "full"}));

        let partial = call_tool(&repo, "clear_cache", &json!({"prefix": "file:"}))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(partial.first_text().unwrap()).unwrap();
        assert_eq!(value, json!({"cleared": 0, "scope": "file:"}));
    }

    #[tokio::test]
    async fn batch_tool_validates_item_count() {
        let repo = repository(Arc::new(FakeSource::default()));
        let paths: Vec<String> = (0..21).map(|i| format!("f{i}.ts")).collect();
        let err = call_tool(&repo, "get_source_files", &json!({ "filePaths": paths }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("less than or equal to 20 items"));
    }
}
