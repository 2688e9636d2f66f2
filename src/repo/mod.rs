//! Repository view of the LibreChat client package.
//!
//! [`Repository`] composes the remote source, the response cache and the
//! retry policy into the operations the tools expose. Every remote read goes
//! through the cache; cache keys are namespaced with [`FILE_PREFIX`] and
//! [`DIR_PREFIX`] so a clear can target one kind of response.

mod tree;

pub use tree::{TreeNode, MAX_TREE_DEPTH};

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::cache::ResponseCache;
use crate::github::{
    CodeSearchResults, DirectoryListing, RateLimitInfo, RateLimitState, RepoCoordinates,
    RepoEntry, RepoSource, SourceError,
};
use crate::resilience::{first_success, with_retry, RetryPolicy};

/// Cache key prefix for raw file contents.
pub const FILE_PREFIX: &str = "file:";

/// Cache key prefix for directory listings.
pub const DIR_PREFIX: &str = "dir:";

/// Default package path inside the repository.
pub const DEFAULT_PACKAGE_PATH: &str = "packages/client";

/// Where the package lives and how it is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    pub repository: RepoCoordinates,
    /// Package root relative to the repository root, without slashes at
    /// either end.
    pub package_path: String,
}

impl PackageLayout {
    /// Layout for the public LibreChat repository.
    #[must_use]
    pub fn librechat() -> Self {
        Self {
            repository: RepoCoordinates {
                owner: "danny-avila".to_string(),
                name: "LibreChat".to_string(),
                branch: "main".to_string(),
            },
            package_path: DEFAULT_PACKAGE_PATH.to_string(),
        }
    }

    /// Source root of the package.
    #[must_use]
    pub fn src_dir(&self) -> String {
        format!("{}/src", self.package_path)
    }

    /// Path of a file or directory relative to the source root.
    #[must_use]
    pub fn src_path(&self, relative: &str) -> String {
        format!("{}/{}", self.src_dir(), relative.trim_matches('/'))
    }

    /// Resolves a caller-supplied path: absolute repository paths are kept,
    /// anything else is taken relative to the package root.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.package_path.clone()
        } else if path == self.package_path || path.starts_with(&format!("{}/", self.package_path)) {
            path.to_string()
        } else {
            format!("{}/{path}", self.package_path)
        }
    }
}

impl Default for PackageLayout {
    fn default() -> Self {
        Self::librechat()
    }
}

/// Source categories that can be fetched by bare name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Hook,
    Component,
    Provider,
    Util,
}

impl SourceKind {
    /// Directory under `src/` holding this kind of source.
    #[must_use]
    pub const fn directory(self) -> &'static str {
        match self {
            Self::Hook => "hooks",
            Self::Component => "components",
            Self::Provider => "Providers",
            Self::Util => "utils",
        }
    }

    /// Extensions tried, in order, when the name has none.
    #[must_use]
    pub const fn extensions(self) -> [&'static str; 2] {
        match self {
            Self::Hook | Self::Util => [".ts", ".tsx"],
            Self::Component | Self::Provider => [".tsx", ".ts"],
        }
    }

    /// Path to try first and the fallbacks after it.
    fn candidates(self, layout: &PackageLayout, name: &str) -> (String, Vec<String>) {
        let base = layout.src_path(&format!("{}/{}", self.directory(), name.trim_matches('/')));
        if has_source_extension(name) {
            return (base, Vec::new());
        }
        let [primary, fallback] = self.extensions();
        (format!("{base}{primary}"), vec![format!("{base}{fallback}")])
    }
}

fn has_source_extension(name: &str) -> bool {
    [".ts", ".tsx", ".js", ".jsx"]
        .iter()
        .any(|ext| name.ends_with(ext))
}

/// Cached payloads.
#[derive(Debug, Clone)]
enum Payload {
    Text(Arc<str>),
    Listing(DirectoryListing),
}

/// Outcome of one path in a batch fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    Success { content: String },
    Error { error: String },
}

/// Scope reported by a cache clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// Only keys with this prefix.
    Prefix(String),
    /// Everything.
    Full,
}

/// Read access to the package through cache and retry.
pub struct Repository {
    source: Arc<dyn RepoSource>,
    cache: ResponseCache<Payload>,
    retry: RetryPolicy,
    rate_limit: Arc<RateLimitState>,
    layout: PackageLayout,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("layout", &self.layout)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Creates a repository view.
    #[must_use]
    pub fn new(
        source: Arc<dyn RepoSource>,
        layout: PackageLayout,
        cache_ttl: std::time::Duration,
        cache_capacity: u64,
        retry: RetryPolicy,
        rate_limit: Arc<RateLimitState>,
    ) -> Self {
        Self {
            source,
            cache: ResponseCache::new(cache_ttl, cache_capacity),
            retry,
            rate_limit,
            layout,
        }
    }

    /// Package layout in use.
    #[must_use]
    pub const fn layout(&self) -> &PackageLayout {
        &self.layout
    }

    // ==================== Cached Primitives ====================

    /// Raw text of the file at a repository path.
    ///
    /// # Errors
    ///
    /// Returns the source error after retries are exhausted.
    pub async fn source_file(&self, path: &str) -> Result<Arc<str>, SourceError> {
        let path = path.trim_matches('/');
        let key = format!("{FILE_PREFIX}{path}");
        let payload = self
            .cache
            .get_or_fetch(&key, || async {
                with_retry(&self.retry, || self.source.fetch_raw_file(path))
                    .await
                    .map(|text| Payload::Text(text.into()))
            })
            .await?;
        match payload {
            Payload::Text(text) => Ok(text),
            Payload::Listing(_) => Err(SourceError::InvalidResponse {
                message: format!("cached entry for {path} is not a file"),
            }),
        }
    }

    /// Listing of a repository path, which may turn out to be a single file.
    ///
    /// # Errors
    ///
    /// Returns the source error after retries are exhausted.
    pub async fn listing(&self, path: &str) -> Result<DirectoryListing, SourceError> {
        let path = path.trim_matches('/');
        let key = format!("{DIR_PREFIX}{path}");
        let payload = self
            .cache
            .get_or_fetch(&key, || async {
                with_retry(&self.retry, || self.source.list_directory(path))
                    .await
                    .map(Payload::Listing)
            })
            .await?;
        match payload {
            Payload::Listing(listing) => Ok(listing),
            Payload::Text(_) => Err(SourceError::InvalidResponse {
                message: format!("cached entry for {path} is not a listing"),
            }),
        }
    }

    /// Entries of the directory at a repository path.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotADirectory`] when the path names a file.
    pub async fn directory(&self, path: &str) -> Result<Vec<RepoEntry>, SourceError> {
        match self.listing(path).await? {
            DirectoryListing::Directory(entries) => Ok(entries),
            DirectoryListing::File(entry) => Err(SourceError::NotADirectory { path: entry.path }),
        }
    }

    // ==================== Package Operations ====================

    /// File under the package root, or an absolute repository path.
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    pub async fn file(&self, path: &str) -> Result<Arc<str>, SourceError> {
        self.source_file(&self.layout.resolve(path)).await
    }

    /// Lists a directory relative to the package root (the root itself when
    /// `directory` is `None`).
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    pub async fn list_files(&self, directory: Option<&str>) -> Result<Vec<RepoEntry>, SourceError> {
        let path = self.layout.resolve(directory.unwrap_or_default());
        self.directory(&path).await
    }

    /// Lists a category directory under `src/`, optionally a subdirectory of it.
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    pub async fn list_kind(
        &self,
        kind: SourceKind,
        subdir: Option<&str>,
    ) -> Result<Vec<RepoEntry>, SourceError> {
        let relative = match subdir.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()) {
            Some(sub) => format!("{}/{sub}", kind.directory()),
            None => kind.directory().to_string(),
        };
        self.directory(&self.layout.src_path(&relative)).await
    }

    /// Fetches a hook, component, provider or util by name, trying the
    /// kind's extensions in order when `name` has none.
    ///
    /// # Errors
    ///
    /// Returns the last candidate's error when none exists.
    pub async fn named_source(&self, kind: SourceKind, name: &str) -> Result<Arc<str>, SourceError> {
        let (first, fallbacks) = kind.candidates(&self.layout, name);
        debug!(?kind, name, %first, ?fallbacks, "Resolving named source");
        first_success(first, fallbacks, |path| async move { self.source_file(&path).await }).await
    }

    /// Parsed `package.json` of the package, or `{"raw": text}` when it is
    /// not valid JSON.
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    pub async fn package_info(&self) -> Result<Value, SourceError> {
        let text = self
            .source_file(&format!("{}/package.json", self.layout.package_path))
            .await?;
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": &*text })))
    }

    /// State store module (`src/store.ts`).
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    pub async fn store(&self) -> Result<Arc<str>, SourceError> {
        self.source_file(&self.layout.src_path("store.ts")).await
    }

    /// Package entry module (`src/index.ts`).
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    pub async fn index(&self) -> Result<Arc<str>, SourceError> {
        self.source_file(&self.layout.src_path("index.ts")).await
    }

    /// Fetches several files at once. Each path gets its own outcome and one
    /// failure does not affect the others.
    pub async fn source_files(&self, paths: &[String]) -> Map<String, Value> {
        let fetches = paths.iter().map(|path| async move {
            let outcome = match self.file(path).await {
                Ok(content) => BatchOutcome::Success {
                    content: content.to_string(),
                },
                Err(err) => BatchOutcome::Error {
                    error: err.to_string(),
                },
            };
            (path.clone(), outcome)
        });
        futures::future::join_all(fetches)
            .await
            .into_iter()
            .map(|(path, outcome)| {
                let value = serde_json::to_value(outcome).unwrap_or(Value::Null);
                (path, value)
            })
            .collect()
    }

    /// Searches code inside the package, optionally filtered by extension.
    ///
    /// # Errors
    ///
    /// Propagates source errors.
    pub async fn search_code(
        &self,
        query: &str,
        extension: Option<&str>,
    ) -> Result<CodeSearchResults, SourceError> {
        let mut scoped = format!(
            "{query} repo:{} path:{}",
            self.layout.repository.full_name(),
            self.layout.package_path
        );
        if let Some(ext) = extension.map(|e| e.trim_start_matches('.')).filter(|e| !e.is_empty()) {
            scoped.push_str(" extension:");
            scoped.push_str(ext);
        }
        with_retry(&self.retry, || self.source.search_code(&scoped)).await
    }

    /// Last observed quota plus a live query. A failed live query is
    /// reported as `null` rather than an error.
    pub async fn rate_limit(&self) -> Value {
        let api: Option<RateLimitInfo> = match self.source.query_rate_limit().await {
            Ok(info) => {
                self.rate_limit.record(info);
                Some(info)
            }
            Err(err) => {
                debug!(error = %err, "Live rate limit query failed");
                None
            }
        };
        json!({
            "tracked": self.rate_limit.snapshot(),
            "api": api,
        })
    }

    /// Clears cached responses. Returns how many entries were removed, or
    /// `None` for a full clear.
    pub async fn clear_cache(&self, prefix: Option<&str>) -> (Option<usize>, ClearScope) {
        match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => {
                let cleared = self.cache.delete_by_prefix(prefix).await;
                info!(prefix, cleared, "Cache cleared by prefix");
                (Some(cleared), ClearScope::Prefix(prefix.to_string()))
            }
            None => {
                self.cache.clear().await;
                info!("Cache cleared");
                (None, ClearScope::Full)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory source for repository tests.

    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    use crate::github::EntryKind;

    /// Canned responses keyed by path, with a call log.
    #[derive(Default)]
    pub struct FakeSource {
        pub files: HashMap<String, Result<String, SourceError>>,
        pub dirs: HashMap<String, Result<DirectoryListing, SourceError>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn file(mut self, path: &str, content: &str) -> Self {
            self.files.insert(path.to_string(), Ok(content.to_string()));
            self
        }

        pub fn dir(mut self, path: &str, entries: &[(&str, EntryKind)]) -> Self {
            let entries = entries
                .iter()
                .map(|(name, kind)| RepoEntry {
                    name: (*name).to_string(),
                    path: format!("{path}/{name}"),
                    kind: *kind,
                    size: 0,
                    download_url: Some(format!("https://raw.test/{path}/{name}")),
                    sha: Some(format!("sha-{name}")),
                })
                .collect();
            self.dirs
                .insert(path.to_string(), Ok(DirectoryListing::Directory(entries)));
            self
        }

        pub fn dir_error(mut self, path: &str, err: SourceError) -> Self {
            self.dirs.insert(path.to_string(), Err(err));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl RepoSource for FakeSource {
        async fn fetch_raw_file(&self, path: &str) -> Result<String, SourceError> {
            self.calls.lock().push(format!("file:{path}"));
            self.files.get(path).cloned().unwrap_or(Err(SourceError::NotFound {
                what: "File",
                path: path.to_string(),
            }))
        }

        async fn list_directory(&self, path: &str) -> Result<DirectoryListing, SourceError> {
            self.calls.lock().push(format!("dir:{path}"));
            self.dirs.get(path).cloned().unwrap_or(Err(SourceError::NotFound {
                what: "Directory",
                path: path.to_string(),
            }))
        }

        async fn query_rate_limit(&self) -> Result<RateLimitInfo, SourceError> {
            self.calls.lock().push("rate_limit".to_string());
            Ok(RateLimitInfo {
                limit: 60,
                remaining: 59,
                reset: 100,
                used: 1,
            })
        }

        async fn search_code(&self, query: &str) -> Result<CodeSearchResults, SourceError> {
            self.calls.lock().push(format!("search:{query}"));
            Ok(CodeSearchResults::default())
        }
    }

    pub fn repository(source: Arc<FakeSource>) -> Repository {
        Repository::new(
            source,
            PackageLayout::librechat(),
            crate::cache::DEFAULT_TTL,
            crate::cache::DEFAULT_MAX_ENTRIES,
            RetryPolicy::default(),
            Arc::new(RateLimitState::new()),
        )
    }
}
