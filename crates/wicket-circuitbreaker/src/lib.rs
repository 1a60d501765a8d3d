//! Circuit breaker for Tower services.
//!
//! A circuit breaker isolates a failing downstream by counting recognized
//! failures and failing fast once a threshold is reached.
//!
//! ## States
//! - **Closed**: normal operation, calls pass through
//! - **Open**: fail-fast, calls are rejected without running the body
//! - **Half-Open**: after the recovery timeout, one probe call decides
//!   whether the circuit closes again or re-opens
//!
//! The whole check-and-act (state read, failure count update, transition)
//! happens under one lock, so concurrent requests to the same path observe
//! a consistent circuit. Time is read from an injected clock so recovery
//! can be driven deterministically in tests. An open-circuit rejection
//! names the owning policy and carries the time until the next probe, so
//! callers can turn it into a retry hint.
//!
//! ## Basic Example
//!
//! ```rust
//! use std::time::Duration;
//! use tower::{service_fn, Layer};
//! use wicket_circuitbreaker::CircuitBreakerLayer;
//!
//! # async fn example() {
//! let layer = CircuitBreakerLayer::<&'static str>::builder()
//!     .failure_threshold(5)
//!     .recovery_timeout(Duration::from_secs(30))
//!     .on_state_transition(|from, to| {
//!         eprintln!("circuit: {from:?} -> {to:?}");
//!     })
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

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::counter;
use tokio::sync::Mutex;
use tower::Service;

mod circuit;
mod config;
mod error;
mod events;
mod layer;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

use circuit::Circuit;

/// A Tower service that applies circuit breaker logic to an inner service.
pub struct CircuitBreaker<S, E> {
    inner: S,
    config: Arc<CircuitBreakerConfig<E>>,
    circuit: Arc<Mutex<Circuit>>,
}

impl<S, E> CircuitBreaker<S, E> {
    pub(crate) fn new(
        inner: S,
        config: Arc<CircuitBreakerConfig<E>>,
        circuit: Arc<Mutex<Circuit>>,
    ) -> Self {
        Self {
            inner,
            config,
            circuit,
        }
    }

    /// Returns the current state of the circuit.
    pub async fn state(&self) -> CircuitState {
        self.circuit.lock().await.state()
    }

    /// Returns the current recognized-failure count.
    pub async fn failure_count(&self) -> u32 {
        self.circuit.lock().await.failure_count()
    }
}

impl<S: Clone, E> Clone for CircuitBreaker<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
            circuit: Arc::clone(&self.circuit),
        }
    }
}

impl<S, Req, E> Service<Req> for CircuitBreaker<S, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Send + 'static,
    E: Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<E>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut inner = self.inner.clone();
        let config = Arc::clone(&self.config);
        let circuit = Arc::clone(&self.circuit);

        Box::pin(async move {
            let admitted = {
                let mut circuit = circuit.lock().await;
                circuit.try_acquire(&config, config.clock.now())
            };

            if let Err(retry_after) = admitted {
                return Err(CircuitBreakerError::OpenCircuit {
                    source: config.source.clone(),
                    retry_after,
                });
            }

            let result = inner.call(req).await;

            match &result {
                Ok(_) => {
                    let mut circuit = circuit.lock().await;
                    circuit.record_success(&config);

                    #[cfg(feature = "metrics")]
                    counter!("wicket_circuitbreaker_calls_total", "outcome" => "success")
                        .increment(1);
                }
                Err(error) if (config.failure_classifier)(error) => {
                    let mut circuit = circuit.lock().await;
                    circuit.record_failure(&config, config.clock.now());

                    #[cfg(feature = "metrics")]
                    counter!("wicket_circuitbreaker_calls_total", "outcome" => "failure")
                        .increment(1);
                }
                // Unrecognized errors pass through without touching state.
                Err(_) => {}
            }

            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
