//! Keyed memoization with TTL for the wicket gateway.
//!
//! Two layers of API:
//! - [`Cache`], a thin facade over a [`wicket_storage::KvStore`] that
//!   memoizes arbitrary async computations under derived keys.
//! - [`ResponseCacheLayer`], the gateway middleware that captures a whole
//!   response (status, headers, body) on a miss and replays it verbatim on
//!   a hit.
//!
//! Concurrent misses for the same key are NOT deduplicated: both callers
//! run the computation and the last writer wins. Single-flight coalescing
//! is a permitted extension, not a promise.

mod error;
mod key;
mod layer;

pub use error::CacheError;
pub use key::CacheKey;
pub use layer::{CachedResponse, ResponseCache, ResponseCacheLayer};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use wicket_storage::{KvStore, StoreError};

/// Memoizes async computations in a shared store.
pub struct Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    store: Arc<dyn KvStore<V>>,
    keyspace: String,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache namespacing its keys under `keyspace`.
    pub fn new(store: Arc<dyn KvStore<V>>, keyspace: impl Into<String>) -> Self {
        Self {
            store,
            keyspace: keyspace.into(),
        }
    }

    /// The keyspace prefix applied to every key.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Builds the full storage key for a caller-derived key.
    pub fn key_for(&self, key: &str) -> String {
        if self.keyspace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.keyspace, key)
        }
    }

    /// Reads the value under `key`, or runs `compute` and stores its result
    /// with `ttl`.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let full_key = self.key_for(key);
        if let Some(hit) = self.store.get(&full_key).await? {
            return Ok(hit);
        }

        let value = compute().await;
        self.store.set(&full_key, value.clone(), ttl).await?;
        Ok(value)
    }

    /// Reads the value under `key` without computing on miss.
    pub async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        self.store.get(&self.key_for(key)).await
    }

    /// Drops every entry under this cache's keyspace.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.clear(&self.keyspace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wicket_core::clock::ManualClock;
    use wicket_storage::MemoryStore;

    fn cache_on(clock: ManualClock) -> Cache<String> {
        Cache::new(
            Arc::new(MemoryStore::with_clock(Arc::new(clock))),
            "test:cache",
        )
    }

    #[tokio::test]
    async fn second_read_is_memoized() {
        let cache = cache_on(ManualClock::new());
        let computed = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let computed = Arc::clone(&computed);
            let value = cache
                .get_or_insert_with("answer", None, move || async move {
                    computed.fetch_add(1, Ordering::SeqCst);
                    "42".to_string()
                })
                .await
                .unwrap();
            assert_eq!(value, "42");
        }
        assert_eq!(computed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_recomputes() {
        let clock = ManualClock::new();
        let cache = cache_on(clock.clone());
        let computed = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let computed = Arc::clone(&computed);
            cache
                .get_or_insert_with("k", Some(Duration::from_secs(10)), move || async move {
                    computed.fetch_add(1, Ordering::SeqCst);
                    "v".to_string()
                })
                .await
                .unwrap();
            clock.advance(Duration::from_secs(11));
        }
        assert_eq!(computed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_scopes_to_keyspace() {
        let clock = ManualClock::new();
        let store: Arc<MemoryStore<String>> =
            Arc::new(MemoryStore::with_clock(Arc::new(clock)));
        let cache = Cache::new(store.clone() as Arc<dyn KvStore<String>>, "a");

        cache
            .get_or_insert_with("k", None, || async { "v".to_string() })
            .await
            .unwrap();
        store.set("b:k", "other".to_string(), None).await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(store.get("b:k").await.unwrap(), Some("other".to_string()));
    }
}
