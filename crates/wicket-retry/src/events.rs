//! Telemetry reported by the retry service.

use std::time::{Duration, Instant};

use wicket_core::events::{PolicyEvent, PolicySource};

/// A retried call's lifetime, reported per policy.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// The call succeeded, possibly after retries.
    Success {
        source: PolicySource,
        at: Instant,
        /// Total attempts made, including the successful one.
        attempts: usize,
    },
    /// A retryable failure; another attempt follows after `delay`.
    Attempt {
        source: PolicySource,
        at: Instant,
        /// Zero-indexed attempt that just failed.
        attempt: usize,
        delay: Duration,
    },
    /// All attempts failed; the last error is re-raised.
    Exhausted {
        source: PolicySource,
        at: Instant,
        attempts: usize,
    },
    /// A non-retryable error short-circuited the loop.
    IgnoredError { source: PolicySource, at: Instant },
}

impl PolicyEvent for RetryEvent {
    fn kind(&self) -> &'static str {
        match self {
            RetryEvent::Success { .. } => "success",
            RetryEvent::Attempt { .. } => "attempt",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn at(&self) -> Instant {
        match self {
            RetryEvent::Success { at, .. }
            | RetryEvent::Attempt { at, .. }
            | RetryEvent::Exhausted { at, .. }
            | RetryEvent::IgnoredError { at, .. } => *at,
        }
    }

    fn source(&self) -> &PolicySource {
        match self {
            RetryEvent::Success { source, .. }
            | RetryEvent::Attempt { source, .. }
            | RetryEvent::Exhausted { source, .. }
            | RetryEvent::IgnoredError { source, .. } => source,
        }
    }
}
