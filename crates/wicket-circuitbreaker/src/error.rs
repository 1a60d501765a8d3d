use std::time::Duration;

use thiserror::Error;
use wicket_core::events::PolicySource;

/// Errors returned by the `CircuitBreaker` service.
///
/// An open-circuit rejection names the policy whose breaker fired and
/// how long until that breaker will admit a probe, so the dispatcher can
/// surface a retry hint alongside the 503.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The policy's circuit is open; the call was rejected without
    /// running the body.
    #[error("circuit for {source} is open; next probe in {retry_after:?}")]
    OpenCircuit {
        /// The policy whose circuit rejected the call.
        source: PolicySource,
        /// Time until the breaker moves to half-open and admits a probe.
        retry_after: Duration,
    },

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true when the call was rejected by an open circuit.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Time until the breaker admits a probe, for rejected calls.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CircuitBreakerError::OpenCircuit { retry_after, .. } => Some(*retry_after),
            CircuitBreakerError::Inner(_) => None,
        }
    }

    /// The policy whose circuit rejected the call.
    pub fn source(&self) -> Option<&PolicySource> {
        match self {
            CircuitBreakerError::OpenCircuit { source, .. } => Some(source),
            CircuitBreakerError::Inner(_) => None,
        }
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::OpenCircuit { .. } => None,
        }
    }
}
