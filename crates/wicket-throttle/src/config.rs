use std::time::Duration;

use wicket_core::events::{Observers, PolicySource};

use crate::events::ThrottleEvent;
use crate::ThrottleAlgo;

/// A rate-limit policy bound to one storage key.
///
/// One policy instance typically corresponds to one configured path
/// pattern; every request matching that pattern consumes from the same
/// quota.
pub struct RateLimitPolicy {
    pub(crate) algo: ThrottleAlgo,
    pub(crate) quota: u64,
    pub(crate) duration: Duration,
    pub(crate) bucket_size: u64,
    pub(crate) key: String,
    pub(crate) observers: Observers<ThrottleEvent>,
    pub(crate) source: PolicySource,
}

impl RateLimitPolicy {
    /// Creates a new policy builder.
    pub fn builder() -> RateLimitPolicyBuilder {
        RateLimitPolicyBuilder::new()
    }

    /// The algorithm this policy runs under.
    pub fn algo(&self) -> ThrottleAlgo {
        self.algo
    }

    /// The storage key quota state is kept under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The policy identity events are reported under.
    pub fn source(&self) -> &PolicySource {
        &self.source
    }
}

/// Builder for a [`RateLimitPolicy`].
pub struct RateLimitPolicyBuilder {
    algo: ThrottleAlgo,
    quota: u64,
    duration: Duration,
    bucket_size: Option<u64>,
    key: Option<String>,
    observers: Observers<ThrottleEvent>,
    scope: String,
    feature_id: Option<u64>,
}

impl RateLimitPolicyBuilder {
    fn new() -> Self {
        Self {
            algo: ThrottleAlgo::FixedWindow,
            quota: 100,
            duration: Duration::from_secs(60),
            bucket_size: None,
            key: None,
            observers: Observers::none(),
            scope: String::from("<unnamed>"),
            feature_id: None,
        }
    }

    /// Sets the admission algorithm.
    ///
    /// Default: `FixedWindow`
    pub fn algorithm(mut self, algo: ThrottleAlgo) -> Self {
        self.algo = algo;
        self
    }

    /// Sets the number of admissions per window.
    ///
    /// Default: 100
    pub fn quota(mut self, quota: u64) -> Self {
        self.quota = quota;
        self
    }

    /// Sets the window duration.
    ///
    /// Default: 60 seconds
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the leaky-bucket capacity.
    ///
    /// Default: same as the quota
    pub fn bucket_size(mut self, size: u64) -> Self {
        self.bucket_size = Some(size);
        self
    }

    /// Sets the storage key the quota state lives under. Falls back to the
    /// policy scope when unset.
    pub fn key<K: Into<String>>(mut self, key: K) -> Self {
        self.key = Some(key.into());
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

    /// Register a callback for rejected admissions.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &ThrottleEvent| {
            if let ThrottleEvent::Rejected { retry_after, .. } = event {
                f(*retry_after);
            }
        });
        self
    }

    /// Register a callback for granted admissions.
    pub fn on_granted<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.observe(move |event: &ThrottleEvent| {
            if matches!(event, ThrottleEvent::Granted { .. }) {
                f();
            }
        });
        self
    }

    /// Builds the policy.
    pub fn build(self) -> RateLimitPolicy {
        let key = self.key.unwrap_or_else(|| self.scope.clone());
        let source = match self.feature_id {
            Some(id) => PolicySource::compiled(id, &self.scope),
            None => PolicySource::named(&self.scope),
        };
        RateLimitPolicy {
            algo: self.algo,
            quota: self.quota,
            duration: self.duration,
            bucket_size: self.bucket_size.unwrap_or(self.quota),
            key,
            observers: self.observers,
            source,
        }
    }
}

impl Default for RateLimitPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
