//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.
//! Every section is optional; missing fields take the built-in defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use crate::error::ConfigError;
use crate::github::{GitHubOptions, RepoCoordinates, DEFAULT_API_URL, DEFAULT_RAW_URL};
use crate::repo::{PackageLayout, DEFAULT_PACKAGE_PATH};
use crate::resilience::RetryPolicy;
use crate::transport::{HttpOptions, TransportMode, DEFAULT_HOST, DEFAULT_PORT};

/// Root configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values from the command line and environment. `None` keeps the file
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub mode: Option<TransportMode>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
    pub github_token: Option<String>,
    pub cache_ttl_secs: Option<u64>,
}

impl Config {
    /// Applies command line and environment overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(mode) = overrides.mode {
            self.transport.mode = mode;
        }
        if let Some(host) = overrides.host {
            self.transport.host = host;
        }
        if let Some(port) = overrides.port {
            self.transport.port = port;
        }
        if let Some(origins) = overrides.cors_origins {
            self.transport.cors_origins = origins;
        }
        if let Some(token) = overrides.github_token {
            self.github.token = Some(token);
        }
        if let Some(ttl) = overrides.cache_ttl_secs {
            self.cache.ttl_secs = ttl;
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, url) in [
            ("github.api_url", &self.github.api_url),
            ("github.raw_url", &self.github.raw_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::invalid(format!(
                    "{field} must be an http(s) URL, got '{url}'"
                )));
            }
        }

        for (field, value) in [
            ("repository.owner", &self.repository.owner),
            ("repository.name", &self.repository.name),
            ("repository.branch", &self.repository.branch),
            ("repository.package_path", &self.repository.package_path),
            ("transport.host", &self.transport.host),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(format!("{field} must not be empty")));
            }
        }

        if self.transport.port == 0 {
            return Err(ConfigError::invalid("transport.port must not be 0"));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::invalid("cache.ttl_secs must be at least 1"));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::invalid("cache.max_entries must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(format!(
                "retry.base_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }

        let levels = ["trace", "debug", "info", "warn", "error"];
        if !levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                levels.join(", ")
            )));
        }
        Ok(())
    }

    /// Package location.
    #[must_use]
    pub fn package_layout(&self) -> PackageLayout {
        PackageLayout {
            repository: self.coordinates(),
            package_path: self.repository.package_path.trim_matches('/').to_string(),
        }
    }

    /// GitHub client settings.
    #[must_use]
    pub fn github_options(&self) -> GitHubOptions {
        let mut options = GitHubOptions::new(self.coordinates());
        options.api_url = self.github.api_url.trim_end_matches('/').to_string();
        options.raw_url = self.github.raw_url.trim_end_matches('/').to_string();
        options.token = self.github.token.clone().filter(|t| !t.trim().is_empty());
        options
    }

    /// HTTP listener settings.
    #[must_use]
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            host: self.transport.host.clone(),
            port: self.transport.port,
            cors_origins: self.transport.cors_origins.clone(),
        }
    }

    /// Retry settings.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Cache entry lifetime.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    fn coordinates(&self) -> RepoCoordinates {
        RepoCoordinates {
            owner: self.repository.owner.clone(),
            name: self.repository.name.clone(),
            branch: self.repository.branch.clone(),
        }
    }
}

/// GitHub endpoints and credentials.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_raw_url")]
    pub raw_url: String,

    /// Personal access token. Raises the API rate limit.
    #[serde(default)]
    pub token: Option<String>,
}

// Manual impl so the token never reaches the logs.
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("raw_url", &self.raw_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            token: None,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_raw_url() -> String {
    DEFAULT_RAW_URL.to_string()
}

/// Which package of which repository to expose.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_package_path")]
    pub package_path: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            name: default_name(),
            branch: default_branch(),
            package_path: default_package_path(),
        }
    }
}

fn default_owner() -> String {
    PackageLayout::librechat().repository.owner
}

fn default_name() -> String {
    PackageLayout::librechat().repository.name
}

fn default_branch() -> String {
    PackageLayout::librechat().repository.branch
}

fn default_package_path() -> String {
    DEFAULT_PACKAGE_PATH.to_string()
}

/// Transport binding and listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    #[serde(default)]
    pub mode: TransportMode,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

const fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

const fn default_max_entries() -> u64 {
    DEFAULT_MAX_ENTRIES
}

/// Backoff settings for transient GitHub failures.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    4
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    8000
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
