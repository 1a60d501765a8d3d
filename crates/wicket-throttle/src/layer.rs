//! Tower layer applying a rate-limit policy to a service.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::counter;
use tower::{Layer, Service};
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::algo::Admission;
use crate::config::RateLimitPolicy;
use crate::error::{RateLimitError, ThrottleError};
use crate::events::ThrottleEvent;
use crate::throttler::Throttler;

/// A Tower [`Layer`] that runs an admission check before each call.
///
/// The check never sleeps: a non-granted admission surfaces as
/// [`RateLimitError::QuotaExceeded`] (or `BucketFull`) carrying the wait,
/// and the caller decides what to do with it.
#[derive(Clone)]
pub struct RateLimitLayer {
    throttler: Arc<Throttler>,
    policy: Arc<RateLimitPolicy>,
}

impl RateLimitLayer {
    /// Creates a layer running `policy` against `throttler`.
    pub fn new(throttler: Arc<Throttler>, policy: RateLimitPolicy) -> Self {
        Self {
            throttler,
            policy: Arc::new(policy),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimit<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimit {
            inner: service,
            throttler: Arc::clone(&self.throttler),
            policy: Arc::clone(&self.policy),
        }
    }
}

/// A Tower service that consumes quota before delegating inward.
pub struct RateLimit<S> {
    inner: S,
    throttler: Arc<Throttler>,
    policy: Arc<RateLimitPolicy>,
}

impl<S: Clone> Clone for RateLimit<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            throttler: Arc::clone(&self.throttler),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<S, Req> Service<Req> for RateLimit<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = RateLimitError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RateLimitError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut inner = self.inner.clone();
        let throttler = Arc::clone(&self.throttler);
        let policy = Arc::clone(&self.policy);

        Box::pin(async move {
            let admission = throttler
                .acquire(
                    policy.algo,
                    &policy.key,
                    policy.quota,
                    policy.duration,
                    Some(policy.bucket_size),
                )
                .await;

            match admission {
                Ok(Admission::Granted) => {
                    #[cfg(feature = "metrics")]
                    counter!("wicket_ratelimit_checks_total", "outcome" => "granted")
                        .increment(1);

                    policy.observers.notify(&ThrottleEvent::Granted {
                        source: policy.source.clone(),
                        at: Instant::now(),
                    });
                    inner.call(req).await.map_err(RateLimitError::Inner)
                }
                Ok(Admission::RetryAfter(retry_after)) => {
                    #[cfg(feature = "metrics")]
                    counter!("wicket_ratelimit_checks_total", "outcome" => "rejected")
                        .increment(1);

                    #[cfg(feature = "tracing")]
                    debug!(
                        policy = %policy.source,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "rate limit exceeded"
                    );

                    policy.observers.notify(&ThrottleEvent::Rejected {
                        source: policy.source.clone(),
                        at: Instant::now(),
                        retry_after,
                    });
                    Err(RateLimitError::QuotaExceeded {
                        retry_after,
                        quota: policy.quota,
                        duration: policy.duration,
                    })
                }
                Err(ThrottleError::BucketFull { bucket_size }) => {
                    #[cfg(feature = "metrics")]
                    counter!("wicket_ratelimit_checks_total", "outcome" => "bucket_full")
                        .increment(1);

                    policy.observers.notify(&ThrottleEvent::BucketFull {
                        source: policy.source.clone(),
                        at: Instant::now(),
                    });
                    Err(RateLimitError::BucketFull { bucket_size })
                }
                Err(ThrottleError::Storage(e)) => Err(RateLimitError::Storage(e)),
            }
        })
    }
}
