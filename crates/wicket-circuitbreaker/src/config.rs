use std::sync::Arc;
use std::time::Duration;

use wicket_core::clock::{Clock, MonotonicClock};
use wicket_core::events::{Observers, PolicySource};

use crate::events::CircuitBreakerEvent;
use crate::CircuitState;

pub(crate) type FailureClassifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Configuration for the circuit breaker.
pub struct CircuitBreakerConfig<E> {
    pub(crate) failure_threshold: u32,
    pub(crate) recovery_timeout: Duration,
    pub(crate) failure_classifier: FailureClassifier<E>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) observers: Observers<CircuitBreakerEvent>,
    pub(crate) source: PolicySource,
}

impl<E> CircuitBreakerConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<E> {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder<E> {
    failure_threshold: u32,
    recovery_timeout: Duration,
    failure_classifier: FailureClassifier<E>,
    clock: Arc<dyn Clock>,
    observers: Observers<CircuitBreakerEvent>,
    scope: String,
    feature_id: Option<u64>,
}

impl<E> CircuitBreakerConfigBuilder<E> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            failure_classifier: Arc::new(|_| true),
            clock: Arc::new(MonotonicClock::new()),
            observers: Observers::none(),
            scope: String::from("<unnamed>"),
            feature_id: None,
        }
    }

    /// Sets the consecutive-failure count at which the circuit opens.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Sets how long the circuit stays open before probing.
    ///
    /// Default: 60 seconds
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets which errors count as failures. Errors the classifier rejects
    /// pass through without touching the circuit state.
    ///
    /// Default: every error counts
    pub fn failure_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.failure_classifier = Arc::new(classifier);
        self
    }

    /// Injects the clock recovery timing is measured on.
    ///
    /// Default: the system monotonic clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the policy scope telemetry and rejections are reported under,
    /// usually the configured path pattern.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.scope = n.into();
        self
    }

    /// Ties telemetry to a compiled feature identity.
    pub fn feature_id(mut self, id: u64) -> Self {
        self.feature_id = Some(id);
        self
    }

    /// Register a callback for state transition events.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        });
        self
    }

    /// Register a callback for rejected (fail-fast) calls.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &CircuitBreakerEvent| {
            if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                f();
            }
        });
        self
    }

    pub(crate) fn into_config(self) -> CircuitBreakerConfig<E> {
        let source = match self.feature_id {
            Some(id) => PolicySource::compiled(id, &self.scope),
            None => PolicySource::named(&self.scope),
        };
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: self.recovery_timeout,
            failure_classifier: self.failure_classifier,
            clock: self.clock,
            observers: self.observers,
            source,
        }
    }

    /// Builds the configuration and returns a [`crate::CircuitBreakerLayer`].
    pub fn build(self) -> crate::layer::CircuitBreakerLayer<E> {
        crate::layer::CircuitBreakerLayer::new(self.into_config())
    }
}

impl<E> Default for CircuitBreakerConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
