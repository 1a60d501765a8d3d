//! Telemetry reported by the rate-limit service.

use std::time::{Duration, Instant};

use wicket_core::events::{PolicyEvent, PolicySource};

/// Outcomes of admission checks, reported per policy.
#[derive(Debug, Clone)]
pub enum ThrottleEvent {
    /// A request was admitted.
    Granted { source: PolicySource, at: Instant },
    /// A request was rejected with a wait hint.
    Rejected {
        source: PolicySource,
        at: Instant,
        retry_after: Duration,
    },
    /// A leaky-bucket request found the bucket at capacity.
    BucketFull { source: PolicySource, at: Instant },
}

impl PolicyEvent for ThrottleEvent {
    fn kind(&self) -> &'static str {
        match self {
            ThrottleEvent::Granted { .. } => "granted",
            ThrottleEvent::Rejected { .. } => "rejected",
            ThrottleEvent::BucketFull { .. } => "bucket_full",
        }
    }

    fn at(&self) -> Instant {
        match self {
            ThrottleEvent::Granted { at, .. }
            | ThrottleEvent::Rejected { at, .. }
            | ThrottleEvent::BucketFull { at, .. } => *at,
        }
    }

    fn source(&self) -> &PolicySource {
        match self {
            ThrottleEvent::Granted { source, .. }
            | ThrottleEvent::Rejected { source, .. }
            | ThrottleEvent::BucketFull { source, .. } => source,
        }
    }
}
