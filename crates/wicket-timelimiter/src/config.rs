use std::time::Duration;

use wicket_core::events::{Observers, PolicySource};

use crate::events::TimeLimiterEvent;
use crate::layer::TimeLimiterLayer;

/// Configuration for the time limiter.
pub struct TimeLimiterConfig {
    /// `None` encodes a non-positive configured deadline: every call
    /// expires immediately.
    pub(crate) deadline: Option<Duration>,
    pub(crate) observers: Observers<TimeLimiterEvent>,
    pub(crate) source: PolicySource,
}

impl TimeLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> TimeLimiterConfigBuilder {
        TimeLimiterConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a time limiter.
pub struct TimeLimiterConfigBuilder {
    deadline: Option<Duration>,
    observers: Observers<TimeLimiterEvent>,
    scope: String,
    feature_id: Option<u64>,
}

impl TimeLimiterConfigBuilder {
    fn new() -> Self {
        Self {
            deadline: Some(Duration::from_secs(30)),
            observers: Observers::none(),
            scope: String::from("<unnamed>"),
            feature_id: None,
        }
    }

    /// Sets the deadline for each call.
    ///
    /// Default: 30 seconds
    pub fn timeout(mut self, deadline: Duration) -> Self {
        self.deadline = if deadline.is_zero() {
            None
        } else {
            Some(deadline)
        };
        self
    }

    /// Sets the deadline from fractional seconds. Values at or below zero
    /// mean "expire immediately".
    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.deadline = if seconds > 0.0 {
            Some(Duration::from_secs_f64(seconds))
        } else {
            None
        };
        self
    }

    /// Sets the policy scope telemetry is reported under, usually the
    /// configured path pattern.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.scope = n.into();
        self
    }

    /// Ties telemetry to a compiled feature identity.
    pub fn feature_id(mut self, id: u64) -> Self {
        self.feature_id = Some(id);
        self
    }

    /// Register a callback for expired deadlines.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &TimeLimiterEvent| {
            if matches!(event, TimeLimiterEvent::Timeout { .. }) {
                f();
            }
        });
        self
    }

    /// Register a callback for calls completing within the deadline.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &TimeLimiterEvent| {
            if let TimeLimiterEvent::Success { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Builds the configuration and returns a [`TimeLimiterLayer`].
    pub fn build(self) -> TimeLimiterLayer {
        let source = match self.feature_id {
            Some(id) => PolicySource::compiled(id, &self.scope),
            None => PolicySource::named(&self.scope),
        };
        TimeLimiterLayer::new(TimeLimiterConfig {
            deadline: self.deadline,
            observers: self.observers,
            source,
        })
    }
}

impl Default for TimeLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
