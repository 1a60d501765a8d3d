use std::sync::Arc;

use tokio::sync::Mutex;
use tower::Layer;

use crate::circuit::Circuit;
use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::CircuitBreaker;

/// A Tower [`Layer`] that applies circuit breaking to a service.
///
/// The breaker state is created with the layer and SHARED by every service
/// the layer produces (and every clone of those services): one compiled
/// path policy owns one circuit, no matter how many concurrent requests
/// flow through it.
pub struct CircuitBreakerLayer<E> {
    config: Arc<CircuitBreakerConfig<E>>,
    circuit: Arc<Mutex<Circuit>>,
}

impl<E> CircuitBreakerLayer<E> {
    pub(crate) fn new(config: CircuitBreakerConfig<E>) -> Self {
        Self {
            config: Arc::new(config),
            circuit: Arc::new(Mutex::new(Circuit::new())),
        }
    }

    /// Returns a new builder for a `CircuitBreakerLayer`.
    pub fn builder() -> CircuitBreakerConfigBuilder<E> {
        CircuitBreakerConfigBuilder::default()
    }
}

impl<E> Clone for CircuitBreakerLayer<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            circuit: Arc::clone(&self.circuit),
        }
    }
}

impl<S, E> Layer<S> for CircuitBreakerLayer<E> {
    type Service = CircuitBreaker<S, E>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreaker::new(
            service,
            Arc::clone(&self.config),
            Arc::clone(&self.circuit),
        )
    }
}
