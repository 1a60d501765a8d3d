use std::sync::Arc;

use tower::Layer;

use crate::config::TimeLimiterConfig;
use crate::TimeLimiter;

/// A Tower [`Layer`] that applies a deadline to a service.
#[derive(Clone)]
pub struct TimeLimiterLayer {
    config: Arc<TimeLimiterConfig>,
}

impl TimeLimiterLayer {
    pub(crate) fn new(config: TimeLimiterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for TimeLimiterLayer {
    type Service = TimeLimiter<S>;

    fn layer(&self, service: S) -> Self::Service {
        TimeLimiter::new(service, Arc::clone(&self.config))
    }
}
