use thiserror::Error;
use wicket_storage::StoreError;

/// Errors returned by the [`crate::ResponseCache`] service.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// The backing store failed.
    #[error(transparent)]
    Storage(StoreError),

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CacheError<E> {
    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CacheError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for CacheError<E> {
    fn from(err: E) -> Self {
        CacheError::Inner(err)
    }
}
