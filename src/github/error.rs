//! Errors returned by the remote data source.
//!
//! Every variant keeps the signal upstream layers classify on: the HTTP
//! status for remote failures and a distinct variant for rate limiting, so
//! retries, tree building and the dispatcher can react without parsing
//! message text.

use thiserror::Error;

/// HTTP statuses that are expected to resolve on their own.
const TRANSIENT_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Errors raised while talking to GitHub.
///
/// The type is `Clone` because a single failed fetch is handed to every
/// caller that was waiting on the same cache key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The requested path does not exist in the repository.
    #[error("{what} not found: {path}")]
    NotFound {
        /// What was being looked up ("File", "Directory", "Path").
        what: &'static str,
        /// Repository path that was requested.
        path: String,
    },

    /// The listing endpoint answered with a single file instead of a directory.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Repository path that was requested.
        path: String,
    },

    /// The API quota for the current credential is exhausted.
    #[error(
        "GitHub API rate limit exceeded. Set the GITHUB_PERSONAL_ACCESS_TOKEN environment \
         variable (or pass --github-api-key) for higher limits."
    )]
    RateLimited {
        /// Epoch seconds at which the quota resets, when GitHub reported it.
        reset: Option<u64>,
    },

    /// Any other non-success HTTP status.
    #[error("GitHub API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// GitHub's `message` field, or the canonical reason phrase.
        message: String,
    },

    /// Connection-level fault: refused, reset, timed out, DNS failure.
    #[error("connection to GitHub failed: {message}")]
    Connection {
        /// Description of the underlying transport error.
        message: String,
    },

    /// The response body could not be interpreted.
    #[error("unexpected response from GitHub API: {message}")]
    InvalidResponse {
        /// What was wrong with the body.
        message: String,
    },
}

impl SourceError {
    /// Returns `true` for failures worth retrying (5xx and connection faults).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => TRANSIENT_STATUSES.contains(status),
            Self::Connection { .. } => true,
            _ => false,
        }
    }

    /// Stable machine-readable name for this error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::NotADirectory { .. } => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Status { .. } | Self::Connection { .. } | Self::InvalidResponse { .. } => {
                "remote_error"
            }
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::InvalidResponse {
                message: err.to_string(),
            };
        }
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            return Self::Connection {
                message: err.to_string(),
            };
        }
        Self::InvalidResponse {
            message: err.to_string(),
        }
    }
}
