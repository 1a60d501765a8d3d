use std::time::Duration;

use thiserror::Error;
use wicket_storage::StoreError;

/// Errors from a throttler admission check.
#[derive(Debug, Clone, Error)]
pub enum ThrottleError {
    /// The leaky bucket is at capacity; the request cannot even queue.
    #[error("bucket is full ({bucket_size} pending)")]
    BucketFull {
        /// Configured bucket capacity.
        bucket_size: u64,
    },

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Errors returned by the [`crate::RateLimit`] service.
#[derive(Debug, Error)]
pub enum RateLimitError<E> {
    /// The quota is exhausted; retry after the embedded wait.
    #[error("rate limit exceeded: {quota} per {duration:?}, retry after {retry_after:?}")]
    QuotaExceeded {
        /// Wait until the next admission can succeed.
        retry_after: Duration,
        /// Configured quota.
        quota: u64,
        /// Configured window duration.
        duration: Duration,
    },

    /// The leaky bucket is at capacity.
    #[error("bucket is full ({bucket_size} pending)")]
    BucketFull {
        /// Configured bucket capacity.
        bucket_size: u64,
    },

    /// The backing store failed.
    #[error(transparent)]
    Storage(StoreError),

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> RateLimitError<E> {
    /// Returns true if the request was rejected by the limiter itself.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            RateLimitError::QuotaExceeded { .. } | RateLimitError::BucketFull { .. }
        )
    }

    /// The wait carried by a quota rejection.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitError::QuotaExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RateLimitError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for RateLimitError<E> {
    fn from(err: E) -> Self {
        RateLimitError::Inner(err)
    }
}
