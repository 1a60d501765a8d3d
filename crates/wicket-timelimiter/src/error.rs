use thiserror::Error;

/// Errors returned by the `TimeLimiter` service.
#[derive(Debug, Error)]
pub enum TimeLimiterError<E> {
    /// The deadline expired before the inner call completed.
    #[error("deadline exceeded")]
    Timeout,

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> TimeLimiterError<E> {
    /// Returns true if the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeLimiterError::Timeout)
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeLimiterError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for TimeLimiterError<E> {
    fn from(err: E) -> Self {
        TimeLimiterError::Inner(err)
    }
}
