//! Telemetry reported by the time limiter.

use std::time::{Duration, Instant};

use wicket_core::events::{PolicyEvent, PolicySource};

/// Deadline-bounded call outcomes, reported per policy.
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The call completed within the deadline.
    Success {
        source: PolicySource,
        at: Instant,
        duration: Duration,
    },
    /// The call failed within the deadline.
    Error {
        source: PolicySource,
        at: Instant,
        duration: Duration,
    },
    /// The deadline expired.
    Timeout { source: PolicySource, at: Instant },
}

impl PolicyEvent for TimeLimiterEvent {
    fn kind(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Success { .. } => "success",
            TimeLimiterEvent::Error { .. } => "error",
            TimeLimiterEvent::Timeout { .. } => "timeout",
        }
    }

    fn at(&self) -> Instant {
        match self {
            TimeLimiterEvent::Success { at, .. }
            | TimeLimiterEvent::Error { at, .. }
            | TimeLimiterEvent::Timeout { at, .. } => *at,
        }
    }

    fn source(&self) -> &PolicySource {
        match self {
            TimeLimiterEvent::Success { source, .. }
            | TimeLimiterEvent::Error { source, .. }
            | TimeLimiterEvent::Timeout { source, .. } => source,
        }
    }
}
