//! Folds feature layers over a downstream handler.
//!
//! Build order, outermost first: stats → timeout → retry → circuit
//! breaker → rate limit → cache → monitoring → auth/RBAC → downstream.
//! Timeout bounds total wall time including retries; retries share that
//! budget; the breaker sits inside retry so retries cannot hammer an open
//! circuit; rate limiting sits inside the breaker so a 429 never counts
//! as a circuit failure; cache sits inside rate limiting so replayed
//! responses still consume quota; monitoring hugs the inner handler so it
//! measures actual work. Auth sits innermost, which means a cache hit on
//! an authed-and-cached path replays without re-authenticating.
//!
//! Each layer's error wrapper is flattened into [`GatewayError`]
//! immediately, so every ring of the chain speaks one error type.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use wicket_auth::AuthGateError;
use wicket_cache::{CacheError, CacheKey, CachedResponse, ResponseCacheLayer};
use wicket_circuitbreaker::CircuitBreakerError;
use wicket_core::{GatewayRequest, GatewayResponse};
use wicket_retry::{RetryLayer, WaitStrategy};
use wicket_storage::KvStore;
use wicket_throttle::{RateLimitError, RateLimitLayer, RateLimitPolicy, Throttler};
use wicket_timelimiter::{TimeLimiterConfig, TimeLimiterError};

use crate::compile::CompiledFeature;
use crate::config::WaitConfig;
use crate::error::GatewayError;
use crate::monitor::MonitorService;
use crate::stats::{StatsRecorder, StatsService};

/// The uniform shape of a composed handler.
pub type Handler = BoxCloneService<GatewayRequest, GatewayResponse, GatewayError>;

/// Shared machinery every composed chain draws on.
pub(crate) struct ChainDeps {
    pub throttler: Arc<Throttler>,
    pub cache_store: Arc<dyn KvStore<CachedResponse>>,
    pub cache_keyspace: String,
    pub stats: Arc<StatsRecorder>,
}

fn status_or(code: u16, fallback: StatusCode) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(fallback)
}

/// Builds the composed handler for one compiled feature.
pub(crate) fn compose_handler(
    feature: &CompiledFeature,
    downstream: Handler,
    deps: &ChainDeps,
) -> Handler {
    let mut handler = downstream;

    if let Some(auth) = &feature.auth {
        handler = BoxCloneService::new(auth.layer(handler).map_err(|err| match err {
            AuthGateError::Rejected(rejection) => GatewayError::Auth(rejection),
            AuthGateError::Inner(inner) => inner,
        }));
    }

    if let Some(monitoring) = &feature.config.monitoring {
        handler = BoxCloneService::new(MonitorService::new(handler, monitoring.log_threshold));
    }

    if let Some(cache) = &feature.config.cache {
        let key = cache
            .cache_key
            .clone()
            .map(CacheKey::Literal)
            .unwrap_or(CacheKey::Default);
        let layer = ResponseCacheLayer::new(
            Arc::clone(&deps.cache_store),
            deps.cache_keyspace.clone(),
            key,
            cache.expire_s.map(Duration::from_secs),
        );
        handler = BoxCloneService::new(layer.layer(handler).map_err(|err| match err {
            CacheError::Storage(storage) => GatewayError::Storage(storage),
            CacheError::Inner(inner) => inner,
        }));
    }

    if let Some(rate_limit) = &feature.config.rate_limit {
        let policy = RateLimitPolicy::builder()
            .algorithm(rate_limit.algorithm)
            .quota(rate_limit.quota)
            .duration(Duration::from_secs(rate_limit.duration))
            .bucket_size(rate_limit.bucket_size.unwrap_or(rate_limit.quota))
            .key(deps
                .throttler
                .key_for(rate_limit.algorithm, &feature.throttle_scope))
            .name(feature.throttle_scope.clone())
            .feature_id(feature.id)
            .build();

        let status = status_or(rate_limit.error_status, StatusCode::TOO_MANY_REQUESTS);
        let message = rate_limit.error_message.clone();
        let layer = RateLimitLayer::new(Arc::clone(&deps.throttler), policy);
        handler = BoxCloneService::new(layer.layer(handler).map_err(move |err| match err {
            RateLimitError::QuotaExceeded { retry_after, .. } => GatewayError::QuotaExceeded {
                retry_after,
                status,
                message: message.clone(),
            },
            RateLimitError::BucketFull { .. } => GatewayError::BucketFull {
                status,
                message: message.clone(),
            },
            RateLimitError::Storage(storage) => GatewayError::Storage(storage),
            RateLimitError::Inner(inner) => inner,
        }));
    }

    if let Some(breaker) = &feature.breaker {
        handler = BoxCloneService::new(breaker.layer(handler).map_err(|err| match err {
            CircuitBreakerError::OpenCircuit { retry_after, .. } => {
                GatewayError::CircuitOpen { retry_after }
            }
            CircuitBreakerError::Inner(inner) => inner,
        }));
    }

    if let Some(retry) = &feature.config.retry {
        let wait = match &retry.wait {
            WaitConfig::Fixed(seconds) => WaitStrategy::Fixed(secs(*seconds)),
            WaitConfig::PerAttempt(seconds) => {
                WaitStrategy::Sequence(seconds.iter().map(|s| secs(*s)).collect())
            }
        };
        let layer = RetryLayer::<GatewayError>::builder()
            .max_attempts(retry.max_attempts)
            .wait(wait)
            .retry_if(GatewayError::is_retryable)
            .name(feature.throttle_scope.clone())
            .feature_id(feature.id)
            .build();
        handler = BoxCloneService::new(layer.layer(handler));
    }

    if let Some(timeout) = &feature.config.timeout {
        let status = status_or(timeout.error_status, StatusCode::GATEWAY_TIMEOUT);
        let message = timeout.error_message.clone();
        let layer = TimeLimiterConfig::builder()
            .timeout_secs(timeout.seconds)
            .name(feature.throttle_scope.clone())
            .feature_id(feature.id)
            .build();
        handler = BoxCloneService::new(layer.layer(handler).map_err(move |err| match err {
            TimeLimiterError::Timeout => GatewayError::DeadlineExceeded {
                status,
                message: message.clone(),
            },
            TimeLimiterError::Inner(inner) => inner,
        }));
    }

    BoxCloneService::new(StatsService::new(handler, Arc::clone(&deps.stats)))
}

fn secs(seconds: f64) -> Duration {
    if seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}
