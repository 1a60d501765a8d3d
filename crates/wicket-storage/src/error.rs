use thiserror::Error;

/// Errors returned by a [`crate::KvStore`] implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("storage codec error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Returns true if the error indicates the backend is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
