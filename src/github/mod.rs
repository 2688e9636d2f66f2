//! Remote data source: read-only access to a GitHub repository.
//!
//! The [`RepoSource`] trait is the seam between the repository layer and the
//! network. [`GitHubClient`] implements it against the GitHub REST API and
//! the raw content host; tests substitute their own implementations.

mod client;
mod error;
mod rate_limit;

pub use client::{GitHubClient, GitHubOptions, DEFAULT_API_URL, DEFAULT_RAW_URL};
pub use error::SourceError;
pub use rate_limit::{RateLimitInfo, RateLimitState};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Repository and branch the server reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    /// Account or organisation that owns the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Branch, tag or commit to read.
    pub branch: String,
}

impl RepoCoordinates {
    /// `owner/name`, the form GitHub search qualifiers expect.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Kind of a directory entry as reported by the contents API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// One entry of a directory listing.
///
/// Serialises to the `{name, path, type, size}` shape returned by the
/// listing tools; `download_url` and `sha` are kept for the tree builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing)]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub sha: Option<String>,
}

/// Result of listing a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryListing {
    /// The path is a directory.
    Directory(Vec<RepoEntry>),
    /// The path names a single file.
    File(RepoEntry),
}

/// One code search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSearchHit {
    pub name: String,
    pub path: String,
    #[serde(rename(deserialize = "html_url", serialize = "url"))]
    pub url: String,
}

/// Code search response, reshaped for tool output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSearchResults {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default, rename(deserialize = "items", serialize = "results"))]
    pub results: Vec<CodeSearchHit>,
}

/// Read-only operations against the hosted repository.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Fetches the text content of the file at `path`.
    async fn fetch_raw_file(&self, path: &str) -> Result<String, SourceError>;

    /// Lists the entries at `path`.
    async fn list_directory(&self, path: &str) -> Result<DirectoryListing, SourceError>;

    /// Asks GitHub for the current quota.
    async fn query_rate_limit(&self) -> Result<RateLimitInfo, SourceError>;

    /// Runs a code search with a fully qualified query string.
    async fn search_code(&self, query: &str) -> Result<CodeSearchResults, SourceError>;
}
