//! In-memory store implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use wicket_core::clock::{Clock, MonotonicClock};

use crate::{KvStore, StoreError};

/// Entry with its optional absolute expiry (clock offset).
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Duration>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Duration) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Mutex-guarded in-memory [`KvStore`].
///
/// Correct under concurrency but a single lock point; sharding is a
/// permitted evolution for hot deployments. Expired entries are evicted
/// lazily on read.
#[derive(Clone)]
pub struct MemoryStore<V> {
    inner: Arc<Mutex<HashMap<String, Entry<V>>>>,
    clock: Arc<dyn Clock>,
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStore<V> {
    /// Creates an empty store on the system monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Creates an empty store reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Number of entries currently held, including not-yet-evicted expired
    /// ones.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[async_trait]
impl<V> KvStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let now = self.clock.now();
        let mut map = self.inner.lock().await;
        match map.get(key) {
            Some(entry) if entry.is_expired(now) => {
                map.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|t| self.clock.now() + t);
        let mut map = self.inner.lock().await;
        map.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self, prefix: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock().await;
        if prefix.is_empty() {
            map.clear();
        } else {
            map.retain(|key, _| !key.starts_with(prefix));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_core::clock::ManualClock;

    fn store_on(clock: ManualClock) -> MemoryStore<&'static str> {
        MemoryStore::with_clock(Arc::new(clock))
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v"));
        assert!(store.exists("k").await.unwrap());
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ttl_expiry_is_lazy_but_observed() {
        let clock = ManualClock::new();
        let store = store_on(clock.clone());

        store
            .set("k", "v", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(9));
        assert_eq!(store.get("k").await.unwrap(), Some("v"));

        clock.advance(Duration::from_secs(2));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
        // Evicted on the read, not merely hidden.
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_ttl() {
        let clock = ManualClock::new();
        let store = store_on(clock.clone());

        store
            .set("k", "old", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        store.set("k", "new", None).await.unwrap();
        clock.advance(Duration::from_secs(5));
        assert_eq!(store.get("k").await.unwrap(), Some("new"));
    }

    #[tokio::test]
    async fn clear_by_prefix() {
        let store = MemoryStore::new();
        store.set("a:1", "x", None).await.unwrap();
        store.set("a:2", "y", None).await.unwrap();
        store.set("b:1", "z", None).await.unwrap();

        store.clear("a:").await.unwrap();
        assert_eq!(store.get("a:1").await.unwrap(), None);
        assert_eq!(store.get("a:2").await.unwrap(), None);
        assert_eq!(store.get("b:1").await.unwrap(), Some("z"));

        store.clear("").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
