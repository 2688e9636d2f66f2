//! Tracking of the GitHub API quota.
//!
//! GitHub reports the current quota on every API response through the
//! `x-ratelimit-*` headers. The client records each observation here so the
//! `get_rate_limit` tool can answer without spending a request.

use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";
const HEADER_USED: &str = "x-ratelimit-used";

/// One quota observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Epoch seconds at which the window resets.
    pub reset: u64,
    /// Requests consumed in the current window.
    #[serde(default)]
    pub used: u64,
}

impl RateLimitInfo {
    /// Extracts an observation from response headers.
    ///
    /// Returns `None` unless `limit`, `remaining` and `reset` are all present
    /// and numeric. Raw content responses carry none of them.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = header_u64(headers, HEADER_LIMIT)?;
        let remaining = header_u64(headers, HEADER_REMAINING)?;
        let reset = header_u64(headers, HEADER_RESET)?;
        let used = header_u64(headers, HEADER_USED).unwrap_or_else(|| limit.saturating_sub(remaining));
        Some(Self {
            limit,
            remaining,
            reset,
            used,
        })
    }

    /// Returns `true` when no requests are left in the window.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Last known quota, shared between the client and the tools.
#[derive(Debug, Default)]
pub struct RateLimitState {
    latest: RwLock<Option<RateLimitInfo>>,
}

impl RateLimitState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the quota carried by `headers`, if any.
    pub fn observe(&self, headers: &HeaderMap) -> Option<RateLimitInfo> {
        let info = RateLimitInfo::from_headers(headers)?;
        self.record(info);
        Some(info)
    }

    /// Records an observation.
    ///
    /// Observations from an older window than the stored one are dropped so a
    /// slow response cannot roll the snapshot back.
    pub fn record(&self, info: RateLimitInfo) {
        let mut latest = self.latest.write();
        if let Some(current) = *latest {
            if info.reset < current.reset {
                tracing::trace!(
                    stale_reset = info.reset,
                    current_reset = current.reset,
                    "Ignoring stale rate limit observation"
                );
                return;
            }
        }
        *latest = Some(info);
    }

    /// Most recent observation.
    #[must_use]
    pub fn snapshot(&self) -> Option<RateLimitInfo> {
        *self.latest.read()
    }
}
