//! GitHub REST API and raw content client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    CodeSearchResults, DirectoryListing, RateLimitInfo, RateLimitState, RepoCoordinates,
    RepoEntry, RepoSource, SourceError,
};

/// Default GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default raw content host.
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const API_ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction options for [`GitHubClient`].
#[derive(Clone)]
pub struct GitHubOptions {
    /// REST API base URL, without trailing slash.
    pub api_url: String,
    /// Raw content base URL, without trailing slash.
    pub raw_url: String,
    /// Repository to read.
    pub repository: RepoCoordinates,
    /// Personal access token, if any.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for GitHubOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubOptions")
            .field("api_url", &self.api_url)
            .field("raw_url", &self.raw_url)
            .field("repository", &self.repository)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GitHubOptions {
    /// Options pointing at public GitHub for the given repository.
    #[must_use]
    pub fn new(repository: RepoCoordinates) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            raw_url: DEFAULT_RAW_URL.to_string(),
            repository,
            token: None,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Error body returned by the GitHub API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateLimitInfo,
}

/// Client for the GitHub REST API and raw content host.
///
/// The credential can be replaced at runtime; requests already in flight keep
/// the value they were built with.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    raw_url: String,
    repository: RepoCoordinates,
    token: RwLock<Option<String>>,
    rate_limit: Arc<RateLimitState>,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("raw_url", &self.raw_url)
            .field("repository", &self.repository)
            .field("authenticated", &self.has_token())
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Creates a client that records quota observations into `rate_limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built (for
    /// example when no TLS backend is available).
    pub fn new(
        options: GitHubOptions,
        rate_limit: Arc<RateLimitState>,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(API_ACCEPT));
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;

        let client = Self {
            http,
            api_url: options.api_url.trim_end_matches('/').to_string(),
            raw_url: options.raw_url.trim_end_matches('/').to_string(),
            repository: options.repository,
            token: RwLock::new(None),
            rate_limit,
        };
        if let Some(token) = options.token {
            client.set_token(&token);
        }
        Ok(client)
    }

    /// Replaces the access token. A blank token removes authentication.
    pub fn set_token(&self, token: &str) {
        let token = token.trim();
        let mut slot = self.token.write();
        if token.is_empty() {
            *slot = None;
            info!("GitHub token cleared, using unauthenticated requests");
        } else {
            *slot = Some(token.to_string());
            info!("GitHub token configured");
        }
    }

    /// Returns `true` when a token is configured.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    /// Repository this client reads from.
    #[must_use]
    pub const fn repository(&self) -> &RepoCoordinates {
        &self.repository
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            self.repository.owner,
            self.repository.name,
            path.trim_matches('/')
        )
    }

    fn raw_file_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_url,
            self.repository.owner,
            self.repository.name,
            self.repository.branch,
            path.trim_matches('/')
        )
    }

    /// Attaches credentials, sends, and records the quota headers.
    async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        let token = self.token.read().clone();
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        self.rate_limit.observe(response.headers());
        debug!(status = %response.status(), url = %response.url(), "GitHub response");
        Ok(response)
    }

    /// Turns a non-success response into an error.
    async fn failure(response: Response, what: &'static str, path: &str) -> SourceError {
        let status = response.status();
        let quota = RateLimitInfo::from_headers(response.headers());
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
        classify_failure(status, quota, message, what, path)
    }
}

/// Maps a failed HTTP exchange onto [`SourceError`].
fn classify_failure(
    status: StatusCode,
    quota: Option<RateLimitInfo>,
    message: String,
    what: &'static str,
    path: &str,
) -> SourceError {
    let exhausted = quota.is_some_and(|q| q.is_exhausted());
    let mentions_limit = message.to_ascii_lowercase().contains("rate limit");
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || mentions_limit))
    {
        return SourceError::RateLimited {
            reset: quota.map(|q| q.reset),
        };
    }
    if status == StatusCode::NOT_FOUND {
        return SourceError::NotFound {
            what,
            path: path.to_string(),
        };
    }
    SourceError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Interprets a contents API body as either a directory or a single file.
fn parse_listing(body: Value, path: &str) -> Result<DirectoryListing, SourceError> {
    if body.is_array() {
        return serde_json::from_value(body)
            .map(DirectoryListing::Directory)
            .map_err(|e| SourceError::InvalidResponse {
                message: format!("directory listing for {path}: {e}"),
            });
    }
    if body.as_object().is_some_and(|map| map.contains_key("type")) {
        return serde_json::from_value::<RepoEntry>(body)
            .map(DirectoryListing::File)
            .map_err(|e| SourceError::InvalidResponse {
                message: format!("entry for {path}: {e}"),
            });
    }
    Err(SourceError::InvalidResponse {
        message: format!("contents of {path} is neither a directory nor a file"),
    })
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn fetch_raw_file(&self, path: &str) -> Result<String, SourceError> {
        let url = self.raw_file_url(path);
        debug!(%url, "Fetching raw file");
        let response = self.send(self.http.get(&url)).await?;
        if response.status().is_success() {
            return Ok(response.text().await?);
        }
        match Self::failure(response, "File", path).await {
            SourceError::Status { status, .. } if status < 500 => Err(SourceError::NotFound {
                what: "File",
                path: path.to_string(),
            }),
            other => Err(other),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<DirectoryListing, SourceError> {
        let url = self.contents_url(path);
        debug!(%url, "Listing directory");
        let request = self
            .http
            .get(&url)
            .query(&[("ref", self.repository.branch.as_str())]);
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(Self::failure(response, "Directory", path).await);
        }
        let body: Value = response.json().await?;
        parse_listing(body, path)
    }

    async fn query_rate_limit(&self) -> Result<RateLimitInfo, SourceError> {
        let url = format!("{}/rate_limit", self.api_url);
        let response = self.send(self.http.get(&url)).await?;
        if !response.status().is_success() {
            return Err(Self::failure(response, "Path", "rate_limit").await);
        }
        let body: RateLimitResponse = response.json().await?;
        Ok(body.rate)
    }

    async fn search_code(&self, query: &str) -> Result<CodeSearchResults, SourceError> {
        let url = format!("{}/search/code", self.api_url);
        debug!(%query, "Searching code");
        let response = self.send(self.http.get(&url).query(&[("q", query)])).await?;
        if !response.status().is_success() {
            return Err(Self::failure(response, "Path", "search/code").await);
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quota(remaining: u64) -> RateLimitInfo {
        RateLimitInfo {
            limit: 60,
            remaining,
            reset: 42,
            used: 60 - remaining,
        }
    }

    #[test]
    fn classifies_rate_limit_by_quota() {
        let err = classify_failure(
            StatusCode::FORBIDDEN,
            Some(quota(0)),
            "Forbidden".to_string(),
            "File",
            "a.ts",
        );
        assert_eq!(err, SourceError::RateLimited { reset: Some(42) });
    }

    #[test]
    fn classifies_rate_limit_by_message() {
        let err = classify_failure(
            StatusCode::FORBIDDEN,
            None,
            "API rate limit exceeded for 1.2.3.4.".to_string(),
            "Directory",
            "src",
        );
        assert_eq!(err, SourceError::RateLimited { reset: None });

        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            "slow down".to_string(),
            "Directory",
            "src",
        );
        assert!(matches!(err, SourceError::RateLimited { .. }));
    }

    #[test]
    fn plain_forbidden_is_not_rate_limited() {
        let err = classify_failure(
            StatusCode::FORBIDDEN,
            Some(quota(12)),
            "Resource not accessible".to_string(),
            "Directory",
            "src",
        );
        assert_eq!(
            err,
            SourceError::Status {
                status: 403,
                message: "Resource not accessible".to_string()
            }
        );
    }

    #[test]
    fn not_found_keeps_path() {
        let err = classify_failure(
            StatusCode::NOT_FOUND,
            None,
            "Not Found".to_string(),
            "Directory",
            "packages/client/src/nope",
        );
        assert_eq!(err.to_string(), "Directory not found: packages/client/src/nope");
    }

    #[test]
    fn server_errors_stay_transient() {
        let err = classify_failure(
            StatusCode::BAD_GATEWAY,
            None,
            "Bad Gateway".to_string(),
            "File",
            "x",
        );
        assert!(err.is_transient());
    }

    #[test]
    fn listing_array_is_directory() {
        let body = json!([
            {"name": "hooks", "path": "src/hooks", "type": "dir", "size": 0},
            {"name": "index.ts", "path": "src/index.ts", "type": "file", "size": 10}
        ]);
        match parse_listing(body, "src").unwrap() {
            DirectoryListing::Directory(entries) => assert_eq!(entries.len(), 2),
            DirectoryListing::File(_) => panic!("expected directory"),
        }
    }

    #[test]
    fn listing_object_is_file() {
        let body = json!({"name": "index.ts", "path": "src/index.ts", "type": "file", "size": 10});
        assert!(matches!(
            parse_listing(body, "src/index.ts").unwrap(),
            DirectoryListing::File(_)
        ));
    }

    #[test]
    fn listing_garbage_is_invalid() {
        let err = parse_listing(json!("nope"), "src").unwrap_err();
        assert_eq!(err.kind(), "remote_error");
    }

    #[test]
    fn blank_token_clears_credentials() {
        let coords = RepoCoordinates {
            owner: "o".to_string(),
            name: "r".to_string(),
            branch: "main".to_string(),
        };
        let mut options = GitHubOptions::new(coords);
        options.token = Some("secret".to_string());
        let client = GitHubClient::new(options, Arc::new(RateLimitState::new())).unwrap();
        assert!(client.has_token());
        client.set_token("   ");
        assert!(!client.has_token());
        client.set_token("  another ");
        assert!(client.has_token());
    }

    #[test]
    fn urls_are_built_from_coordinates() {
        let coords = RepoCoordinates {
            owner: "danny-avila".to_string(),
            name: "LibreChat".to_string(),
            branch: "main".to_string(),
        };
        let mut options = GitHubOptions::new(coords);
        options.api_url = "http://localhost:1/".to_string();
        let client = GitHubClient::new(options, Arc::new(RateLimitState::new())).unwrap();
        assert_eq!(
            client.contents_url("/packages/client/"),
            "http://localhost:1/repos/danny-avila/LibreChat/contents/packages/client"
        );
        assert_eq!(
            client.raw_file_url("packages/client/package.json"),
            "https://raw.githubusercontent.com/danny-avila/LibreChat/main/packages/client/package.json"
        );
    }
}
