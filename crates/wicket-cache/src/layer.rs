//! Response-caching middleware.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode};
#[cfg(feature = "metrics")]
use metrics::counter;
use tower::{Layer, Service};
#[cfg(feature = "tracing")]
use tracing::trace;
use wicket_core::{GatewayRequest, GatewayResponse};
use wicket_storage::KvStore;

use crate::error::CacheError;
use crate::key::CacheKey;

/// A captured response: replayed verbatim on a hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl From<&GatewayResponse> for CachedResponse {
    fn from(resp: &GatewayResponse) -> Self {
        Self {
            status: resp.status,
            headers: resp.headers.clone(),
            body: resp.body.clone(),
        }
    }
}

impl CachedResponse {
    fn replay(&self) -> GatewayResponse {
        GatewayResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            cache_hit: true,
        }
    }
}

/// A Tower [`Layer`] that serves captured responses for repeated requests.
#[derive(Clone)]
pub struct ResponseCacheLayer {
    store: Arc<dyn KvStore<CachedResponse>>,
    keyspace: String,
    key: CacheKey,
    ttl: Option<Duration>,
}

impl ResponseCacheLayer {
    /// Creates a layer storing captured responses under `keyspace`.
    pub fn new(
        store: Arc<dyn KvStore<CachedResponse>>,
        keyspace: impl Into<String>,
        key: CacheKey,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            keyspace: keyspace.into(),
            key,
            ttl,
        }
    }
}

impl<S> Layer<S> for ResponseCacheLayer {
    type Service = ResponseCache<S>;

    fn layer(&self, service: S) -> Self::Service {
        ResponseCache {
            inner: service,
            store: Arc::clone(&self.store),
            keyspace: self.keyspace.clone(),
            key: self.key.clone(),
            ttl: self.ttl,
        }
    }
}

/// A Tower service that replays cached responses.
pub struct ResponseCache<S> {
    inner: S,
    store: Arc<dyn KvStore<CachedResponse>>,
    keyspace: String,
    key: CacheKey,
    ttl: Option<Duration>,
}

impl<S: Clone> Clone for ResponseCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            store: Arc::clone(&self.store),
            keyspace: self.keyspace.clone(),
            key: self.key.clone(),
            ttl: self.ttl,
        }
    }
}

impl<S> Service<GatewayRequest> for ResponseCache<S>
where
    S: Service<GatewayRequest, Response = GatewayResponse> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = GatewayResponse;
    type Error = CacheError<S::Error>;
    type Future = BoxFuture<'static, Result<GatewayResponse, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CacheError::Inner)
    }

    fn call(&mut self, req: GatewayRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let store = Arc::clone(&self.store);
        let ttl = self.ttl;
        let derived = self.key.derive(&req);
        let full_key = if self.keyspace.is_empty() {
            derived
        } else {
            format!("{}:{}", self.keyspace, derived)
        };

        Box::pin(async move {
            if let Some(hit) = store.get(&full_key).await.map_err(CacheError::Storage)? {
                #[cfg(feature = "metrics")]
                counter!("wicket_cache_lookups_total", "outcome" => "hit").increment(1);

                #[cfg(feature = "tracing")]
                trace!(key = %full_key, "cache hit");

                return Ok(hit.replay());
            }

            #[cfg(feature = "metrics")]
            counter!("wicket_cache_lookups_total", "outcome" => "miss").increment(1);

            let resp = inner.call(req).await.map_err(CacheError::Inner)?;
            store
                .set(&full_key, CachedResponse::from(&resp), ttl)
                .await
                .map_err(CacheError::Storage)?;
            Ok(resp)
        })
    }
}
