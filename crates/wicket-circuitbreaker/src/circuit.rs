//! Circuit state machine.

use std::time::Duration;

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::counter;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing fast, calls are rejected without running the body.
    Open,
    /// Probing: one call through decides recovery or re-opening.
    HalfOpen,
}

/// The mutable breaker state. Callers hold the lock across the whole
/// check-and-act, which is what makes the transitions atomic.
pub(crate) struct Circuit {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Duration>,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Decides whether a call arriving at `now` may proceed. An OPEN
    /// circuit whose recovery timeout has elapsed moves to HALF_OPEN and
    /// admits the probe; otherwise the rejection carries the time until
    /// that probe.
    pub(crate) fn try_acquire<E>(
        &mut self,
        config: &CircuitBreakerConfig<E>,
        now: Duration,
    ) -> Result<(), Duration> {
        if self.state != CircuitState::Open {
            return Ok(());
        }

        let since_failure = match self.last_failure_at {
            Some(at) => now.saturating_sub(at),
            // No recorded failure to wait out; admit the probe.
            None => config.recovery_timeout,
        };

        if since_failure >= config.recovery_timeout {
            self.transition(config, CircuitState::HalfOpen);
            Ok(())
        } else {
            config.observers.notify(&CircuitBreakerEvent::CallRejected {
                source: config.source.clone(),
                at: std::time::Instant::now(),
            });

            #[cfg(feature = "metrics")]
            counter!("wicket_circuitbreaker_calls_total", "outcome" => "rejected").increment(1);

            Err(config.recovery_timeout - since_failure)
        }
    }

    /// Records a successful call: the circuit closes and the count resets.
    pub(crate) fn record_success<E>(&mut self, config: &CircuitBreakerConfig<E>) {
        self.failure_count = 0;
        if self.state != CircuitState::Closed {
            self.transition(config, CircuitState::Closed);
        }

        config
            .observers
            .notify(&CircuitBreakerEvent::SuccessRecorded {
                source: config.source.clone(),
                at: std::time::Instant::now(),
                state: self.state,
            });
    }

    /// Records a recognized failure at `now`, opening the circuit once the
    /// threshold is reached (and immediately on a failed half-open probe).
    pub(crate) fn record_failure<E>(&mut self, config: &CircuitBreakerConfig<E>, now: Duration) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_at = Some(now);

        config
            .observers
            .notify(&CircuitBreakerEvent::FailureRecorded {
                source: config.source.clone(),
                at: std::time::Instant::now(),
                state: self.state,
            });

        if self.failure_count >= config.failure_threshold && self.state != CircuitState::Open {
            self.transition(config, CircuitState::Open);
        }
    }

    fn transition<E>(&mut self, config: &CircuitBreakerConfig<E>, to: CircuitState) {
        let from = self.state;
        self.state = to;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = %config.source,
            from = ?from,
            to = ?to,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        counter!("wicket_circuitbreaker_transitions_total").increment(1);

        config
            .observers
            .notify(&CircuitBreakerEvent::StateTransition {
                source: config.source.clone(),
                at: std::time::Instant::now(),
                from_state: from,
                to_state: to,
            });
    }
}
