//! Bounded retries for Tower services.
//!
//! Runs the inner service up to `max_attempts` times. Errors the configured
//! classifier rejects are re-raised immediately; retryable errors sleep the
//! wait strategy's duration for the current (zero-indexed) attempt and try
//! again. The final attempt's error is re-raised as-is, so the caller sees
//! the last cause rather than a wrapper.
//!
//! ## Basic Example
//!
//! ```rust
//! use std::time::Duration;
//! use tower::{service_fn, Layer};
//! use wicket_retry::{RetryLayer, WaitStrategy};
//!
//! # async fn example() {
//! let layer = RetryLayer::<&'static str>::builder()
//!     .max_attempts(3)
//!     .wait(WaitStrategy::Fixed(Duration::from_millis(100)))
//!     .retry_if(|err: &&'static str| *err == "transient")
//!     .build();
//!
//! let service = layer.layer(service_fn(|req: String| async move {
//!     Ok::<_, &'static str>(req)
//! }));
//! # let _ = service;
//! # }
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tower::Service;
#[cfg(feature = "tracing")]
use tracing::{debug, warn};

mod config;
mod events;
mod layer;

pub use config::{RetryConfig, RetryConfigBuilder, WaitStrategy};
pub use events::RetryEvent;
pub use layer::RetryLayer;

/// A Tower service that retries failed calls of its inner service.
pub struct Retry<S, E> {
    inner: S,
    config: Arc<RetryConfig<E>>,
}

impl<S, E> Retry<S, E> {
    pub(crate) fn new(inner: S, config: Arc<RetryConfig<E>>) -> Self {
        Self { inner, config }
    }
}

impl<S: Clone, E> Clone for Retry<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req, E> Service<Req> for Retry<S, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = E;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut service = self.inner.clone();
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let mut attempt: usize = 0;

            loop {
                let result = service.call(req.clone()).await;

                match result {
                    Ok(response) => {
                        #[cfg(feature = "tracing")]
                        if attempt > 0 {
                            debug!(
                                retry = %config.source,
                                attempts = attempt + 1,
                                "request succeeded after retries"
                            );
                        }

                        config.observers.notify(&RetryEvent::Success {
                            source: config.source.clone(),
                            at: Instant::now(),
                            attempts: attempt + 1,
                        });
                        return Ok(response);
                    }
                    Err(error) => {
                        if !(config.retryable)(&error) {
                            config.observers.notify(&RetryEvent::IgnoredError {
                                source: config.source.clone(),
                                at: Instant::now(),
                            });
                            return Err(error);
                        }

                        if attempt + 1 >= config.max_attempts {
                            #[cfg(feature = "tracing")]
                            warn!(
                                retry = %config.source,
                                attempts = attempt + 1,
                                max_attempts = config.max_attempts,
                                "retry attempts exhausted"
                            );

                            config.observers.notify(&RetryEvent::Exhausted {
                                source: config.source.clone(),
                                at: Instant::now(),
                                attempts: attempt + 1,
                            });
                            return Err(error);
                        }

                        let delay = config.wait.delay(attempt);

                        #[cfg(feature = "tracing")]
                        debug!(
                            retry = %config.source,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after delay"
                        );

                        config.observers.notify(&RetryEvent::Attempt {
                            source: config.source.clone(),
                            at: Instant::now(),
                            attempt,
                            delay,
                        });

                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                    }
                }
            }
        })
    }
}
