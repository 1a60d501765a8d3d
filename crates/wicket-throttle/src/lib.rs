//! Rate limiting for the wicket gateway.
//!
//! Four admission algorithms share one contract: given a key, a quota and a
//! duration, a check either grants the request now or reports how long the
//! caller must wait. The check itself never sleeps; the caller decides to
//! wait or to fail.
//!
//! State lives behind the [`wicket_storage::KvStore`] interface, so a
//! network-backed store can replace the in-memory one without touching
//! algorithm code. The in-memory path serializes check-and-update under a
//! mutex; a distributed store must make the same transition atomic on the
//! server side (scripts or compare-and-set).
//!
//! ## Basic Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wicket_core::clock::MonotonicClock;
//! use wicket_storage::MemoryStore;
//! use wicket_throttle::{Admission, Throttler};
//!
//! # async fn example() {
//! let throttler = Throttler::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MonotonicClock::new()),
//!     "gateway",
//! );
//!
//! match throttler
//!     .fixed_window("user:42", 100, Duration::from_secs(60))
//!     .await
//!     .unwrap()
//! {
//!     Admission::Granted => { /* proceed */ }
//!     Admission::RetryAfter(wait) => {
//!         eprintln!("limited, retry in {wait:?}");
//!     }
//! }
//! # }
//! ```
//!
//! The [`RateLimitLayer`] applies a policy to a `tower::Service`; the
//! [`LeakyBucketScheduler`] is the queue-based variant that paces queued
//! jobs instead of rejecting callers.

use serde::{Deserialize, Serialize};

mod algo;
mod config;
mod error;
mod events;
mod layer;
mod scheduler;
mod throttler;

pub use algo::{Admission, ThrottleState};
pub use config::{RateLimitPolicy, RateLimitPolicyBuilder};
pub use error::{RateLimitError, ThrottleError};
pub use events::ThrottleEvent;
pub use layer::{RateLimit, RateLimitLayer};
pub use scheduler::LeakyBucketScheduler;
pub use throttler::Throttler;

/// The admission algorithm a policy runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleAlgo {
    /// Quota resets at fixed interval boundaries.
    FixedWindow,
    /// Leaky-count approximation of a per-event sliding window.
    SlidingWindow,
    /// Refills whole tokens at `quota / duration` per second.
    TokenBucket,
    /// Drains at `quota / duration` per second from a bounded bucket.
    LeakyBucket,
}

impl ThrottleAlgo {
    /// Stable identifier used in storage keys and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleAlgo::FixedWindow => "fixed_window",
            ThrottleAlgo::SlidingWindow => "sliding_window",
            ThrottleAlgo::TokenBucket => "token_bucket",
            ThrottleAlgo::LeakyBucket => "leaky_bucket",
        }
    }
}

impl std::fmt::Display for ThrottleAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
