//! Pluggable storage for wicket's cache and throttle state.
//!
//! The gateway's algorithmic components depend only on the narrow
//! [`KvStore`] interface: a string-keyed map with per-entry TTL. The
//! in-memory implementation ships here; a network-backed implementation
//! (e.g. redis) is a drop-in replacement with identical contracts, which is
//! why every operation returns a `Result` even though the local store
//! cannot fail.
//!
//! Storage keys are namespaced `<keyspace>:<subsystem>:…` by the callers;
//! the store itself is oblivious to the scheme apart from prefix-based
//! [`KvStore::clear`].

use std::time::Duration;

use async_trait::async_trait;

mod error;
mod memory;
mod queue;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use queue::{BoundedQueue, QueueFullError};

/// String-keyed value store with optional per-entry expiry.
///
/// Operations are atomic with respect to each other. A value set with TTL
/// `t` is readable until `t` elapses; after that, `get` returns `None` and
/// `exists` returns `false`. Implementations may evict lazily on read or
/// eagerly in the background.
#[async_trait]
pub trait KvStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Reads the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    /// Writes `value` at `key`, replacing any prior entry. With
    /// `ttl: Some(t)` the entry expires `t` after the write.
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes the entry at `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every entry whose key starts with `prefix`. An empty prefix
    /// clears the store.
    async fn clear(&self, prefix: &str) -> Result<(), StoreError>;

    /// Whether a live (non-expired) entry exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Releases any resources held by the store.
    async fn close(&self) -> Result<(), StoreError>;
}
