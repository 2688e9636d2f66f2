//! Time-bounded response cache with per-key request coalescing.
//!
//! Concurrent lookups of a missing key share one producer run. Failures are
//! handed to every waiter but never stored, so the next lookup tries again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_ENTRIES: u64 = 1000;

/// String-keyed cache of remote responses.
#[derive(Clone)]
pub struct ResponseCache<V> {
    entries: Cache<String, V>,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache whose entries expire `ttl` after insertion.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }

    /// Returns the cached value for `key`, running `producer` on a miss.
    ///
    /// # Errors
    ///
    /// Returns the producer's error. Every caller that joined the same
    /// in-flight fetch receives a clone of it.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Clone + Send + Sync + 'static,
    {
        self.entries
            .try_get_with(key.to_string(), async {
                debug!(key, "Cache miss");
                producer().await
            })
            .await
            .map_err(Arc::unwrap_or_clone)
    }

    /// Returns the cached value without fetching.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    /// Removes every entry whose key starts with `prefix`. Returns how many
    /// entries were removed.
    pub async fn delete_by_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key.as_str()).await.is_some() {
                removed += 1;
            }
        }
        debug!(prefix, removed, "Cleared cache entries by prefix");
        removed
    }

    /// Removes every entry.
    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        debug!("Cleared entire cache");
    }

    /// Number of live entries.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Returns `true` when nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
