//! Deadline enforcement for Tower services.
//!
//! Wraps the inner call in a deadline; on expiry the in-flight future is
//! dropped (cancelling any I/O it was suspended on) and the caller gets
//! [`TimeLimiterError::Timeout`]. A non-positive configured deadline fires
//! immediately, without polling the inner future at all.
//!
//! ## Basic Example
//!
//! ```rust
//! use std::time::Duration;
//! use tower::{service_fn, Layer};
//! use wicket_timelimiter::TimeLimiterConfig;
//!
//! # async fn example() {
//! let layer = TimeLimiterConfig::builder()
//!     .timeout(Duration::from_secs(5))
//!     .on_timeout(|| {
//!         eprintln!("request timed out");
//!     })
//!     .build();
//!
//! let service = layer.layer(service_fn(|req: String| async move {
//!     Ok::<_, ()>(req)
//! }));
//! # let _ = service;
//! # }
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tokio::time::timeout;
use tower::Service;

mod config;
mod error;
mod events;
mod layer;

pub use config::{TimeLimiterConfig, TimeLimiterConfigBuilder};
pub use error::TimeLimiterError;
pub use events::TimeLimiterEvent;
pub use layer::TimeLimiterLayer;

/// A Tower service that applies a deadline to an inner service.
#[derive(Clone)]
pub struct TimeLimiter<S> {
    inner: S,
    config: Arc<TimeLimiterConfig>,
}

impl<S> TimeLimiter<S> {
    pub(crate) fn new(inner: S, config: Arc<TimeLimiterConfig>) -> Self {
        Self { inner, config }
    }
}

impl<S, Request> Service<Request> for TimeLimiter<S>
where
    S: Service<Request> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Request: Send + 'static,
{
    type Response = S::Response;
    type Error = TimeLimiterError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(TimeLimiterError::Inner)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let Some(deadline) = config.deadline else {
                // Non-positive deadline: expire without running the body.
                config.observers.notify(&TimeLimiterEvent::Timeout {
                    source: config.source.clone(),
                    at: Instant::now(),
                });
                return Err(TimeLimiterError::Timeout);
            };

            let start = Instant::now();
            match timeout(deadline, inner.call(req)).await {
                Ok(Ok(response)) => {
                    config.observers.notify(&TimeLimiterEvent::Success {
                        source: config.source.clone(),
                        at: Instant::now(),
                        duration: start.elapsed(),
                    });
                    Ok(response)
                }
                Ok(Err(err)) => {
                    config.observers.notify(&TimeLimiterEvent::Error {
                        source: config.source.clone(),
                        at: Instant::now(),
                        duration: start.elapsed(),
                    });
                    Err(TimeLimiterError::Inner(err))
                }
                Err(_elapsed) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        limiter = %config.source,
                        deadline_ms = deadline.as_millis() as u64,
                        "request deadline expired"
                    );

                    config.observers.notify(&TimeLimiterEvent::Timeout {
                        source: config.source.clone(),
                        at: Instant::now(),
                    });
                    Err(TimeLimiterError::Timeout)
                }
            }
        })
    }
}
