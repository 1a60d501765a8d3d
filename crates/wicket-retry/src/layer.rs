use std::sync::Arc;

use tower::Layer;

use crate::config::{RetryConfig, RetryConfigBuilder};
use crate::Retry;

/// A Tower [`Layer`] that applies bounded retries to a service.
pub struct RetryLayer<E> {
    config: Arc<RetryConfig<E>>,
}

impl<E> RetryLayer<E> {
    pub(crate) fn new(config: RetryConfig<E>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns a new builder for a `RetryLayer`.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::default()
    }
}

impl<E> Clone for RetryLayer<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, E> Layer<S> for RetryLayer<E> {
    type Service = Retry<S, E>;

    fn layer(&self, service: S) -> Self::Service {
        Retry::new(service, Arc::clone(&self.config))
    }
}
