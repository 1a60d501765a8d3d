//! Telemetry reported by the circuit breaker.

use std::time::Instant;

use wicket_core::events::{PolicyEvent, PolicySource};

use crate::CircuitState;

/// Circuit activity, reported per policy.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        source: PolicySource,
        at: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was rejected because the circuit is open.
    CallRejected { source: PolicySource, at: Instant },
    /// A successful call was recorded.
    SuccessRecorded {
        source: PolicySource,
        at: Instant,
        state: CircuitState,
    },
    /// A recognized failure was recorded.
    FailureRecorded {
        source: PolicySource,
        at: Instant,
        state: CircuitState,
    },
}

impl PolicyEvent for CircuitBreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn at(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { at, .. }
            | CircuitBreakerEvent::CallRejected { at, .. }
            | CircuitBreakerEvent::SuccessRecorded { at, .. }
            | CircuitBreakerEvent::FailureRecorded { at, .. } => *at,
        }
    }

    fn source(&self) -> &PolicySource {
        match self {
            CircuitBreakerEvent::StateTransition { source, .. }
            | CircuitBreakerEvent::CallRejected { source, .. }
            | CircuitBreakerEvent::SuccessRecorded { source, .. }
            | CircuitBreakerEvent::FailureRecorded { source, .. } => source,
        }
    }
}
