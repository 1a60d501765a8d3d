use std::sync::Arc;
use std::time::Duration;

use wicket_core::events::{Observers, PolicySource};

use crate::events::RetryEvent;
use crate::layer::RetryLayer;

/// How long to wait before a given (zero-indexed) retry attempt.
#[derive(Clone)]
pub enum WaitStrategy {
    /// The same wait before every retry.
    Fixed(Duration),
    /// Per-attempt waits; the last value holds beyond the sequence.
    Sequence(Vec<Duration>),
    /// Arbitrary function of the attempt index.
    Custom(Arc<dyn Fn(usize) -> Duration + Send + Sync>),
}

impl WaitStrategy {
    /// The wait before retrying after attempt `attempt`.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            WaitStrategy::Fixed(wait) => *wait,
            WaitStrategy::Sequence(waits) => match waits.get(attempt) {
                Some(wait) => *wait,
                None => waits.last().copied().unwrap_or(Duration::ZERO),
            },
            WaitStrategy::Custom(f) => f(attempt),
        }
    }
}

impl std::fmt::Debug for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitStrategy::Fixed(wait) => write!(f, "WaitStrategy::Fixed({wait:?})"),
            WaitStrategy::Sequence(waits) => write!(f, "WaitStrategy::Sequence({waits:?})"),
            WaitStrategy::Custom(_) => f.write_str("WaitStrategy::Custom(..)"),
        }
    }
}

pub(crate) type RetryClassifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Configuration for the retry service.
pub struct RetryConfig<E> {
    pub(crate) max_attempts: usize,
    pub(crate) wait: WaitStrategy,
    pub(crate) retryable: RetryClassifier<E>,
    pub(crate) observers: Observers<RetryEvent>,
    pub(crate) source: PolicySource,
}

impl<E> RetryConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a retry layer.
pub struct RetryConfigBuilder<E> {
    max_attempts: usize,
    wait: WaitStrategy,
    retryable: RetryClassifier<E>,
    observers: Observers<RetryEvent>,
    scope: String,
    feature_id: Option<u64>,
}

impl<E> RetryConfigBuilder<E> {
    fn new() -> Self {
        Self {
            max_attempts: 3,
            wait: WaitStrategy::Fixed(Duration::from_secs(1)),
            retryable: Arc::new(|_| true),
            observers: Observers::none(),
            scope: String::from("<unnamed>"),
            feature_id: None,
        }
    }

    /// Sets the maximum number of attempts, including the first.
    ///
    /// Default: 3. Clamped to at least 1.
    pub fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Sets the wait strategy between attempts.
    ///
    /// Default: fixed 1 second
    pub fn wait(mut self, strategy: WaitStrategy) -> Self {
        self.wait = strategy;
        self
    }

    /// Sets which errors are worth retrying.
    ///
    /// Default: every error
    pub fn retry_if<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(classifier);
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

    /// Register a callback invoked before each sleep, with the one-indexed
    /// attempt number and the chosen delay.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &RetryEvent| {
            if let RetryEvent::Attempt { attempt, delay, .. } = event {
                f(attempt + 1, *delay);
            }
        });
        self
    }

    /// Register a callback invoked when all attempts are exhausted.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &RetryEvent| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Builds the configuration and returns a [`RetryLayer`].
    pub fn build(self) -> RetryLayer<E> {
        let source = match self.feature_id {
            Some(id) => PolicySource::compiled(id, &self.scope),
            None => PolicySource::named(&self.scope),
        };
        RetryLayer::new(RetryConfig {
            max_attempts: self.max_attempts,
            wait: self.wait,
            retryable: self.retryable,
            observers: self.observers,
            source,
        })
    }
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
