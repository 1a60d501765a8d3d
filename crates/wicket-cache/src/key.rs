//! Cache key derivation for request caching.

use std::sync::Arc;

use wicket_core::GatewayRequest;

/// How the cache key for a request is derived.
///
/// The derived key is always prefixed with the cache's keyspace before it
/// reaches storage.
#[derive(Clone)]
pub enum CacheKey {
    /// `response:<METHOD>:<path>`: one entry per method/path pair.
    Default,
    /// A fixed key: every matching request shares one entry.
    Literal(String),
    /// Caller-supplied derivation from the request.
    Derived(Arc<dyn Fn(&GatewayRequest) -> String + Send + Sync>),
}

impl CacheKey {
    /// Derives the (unprefixed) key for `req`.
    pub fn derive(&self, req: &GatewayRequest) -> String {
        match self {
            CacheKey::Default => format!("response:{}:{}", req.method, req.path()),
            CacheKey::Literal(key) => key.clone(),
            CacheKey::Derived(f) => f(req),
        }
    }
}

impl std::fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Default => f.write_str("CacheKey::Default"),
            CacheKey::Literal(key) => write!(f, "CacheKey::Literal({key:?})"),
            CacheKey::Derived(_) => f.write_str("CacheKey::Derived(..)"),
        }
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey::Literal(key)
    }
}
