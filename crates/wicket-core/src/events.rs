//! Telemetry for compiled path policies.
//!
//! Every feature layer reports what it did through a small set of
//! observers owned by its config. Events carry a [`PolicySource`] naming
//! the compiled path policy they happened under (the feature identity the
//! dispatcher memoizes handlers by, plus the configured scope), so a
//! rejected call or a circuit transition can be traced back to the config
//! entry that produced it.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// The compiled path policy a piece of telemetry belongs to.
///
/// The scope is usually the configured path pattern; the feature id is
/// the compiled-policy identity and is present once the policy has been
/// through the compiler (hand-built layers in tests and examples have
/// none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySource {
    feature_id: Option<u64>,
    scope: Arc<str>,
}

impl PolicySource {
    /// A source known only by its scope.
    pub fn named(scope: impl AsRef<str>) -> Self {
        Self {
            feature_id: None,
            scope: Arc::from(scope.as_ref()),
        }
    }

    /// A source tied to a compiled feature identity.
    pub fn compiled(feature_id: u64, scope: impl AsRef<str>) -> Self {
        Self {
            feature_id: Some(feature_id),
            scope: Arc::from(scope.as_ref()),
        }
    }

    /// The compiled feature identity, when known.
    pub fn feature_id(&self) -> Option<u64> {
        self.feature_id
    }

    /// The policy scope, usually the configured path pattern.
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl Default for PolicySource {
    fn default() -> Self {
        Self::named("<unnamed>")
    }
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.feature_id {
            Some(id) => write!(f, "{}#{id}", self.scope),
            None => f.write_str(&self.scope),
        }
    }
}

impl std::error::Error for PolicySource {}

/// An event reported by a feature layer.
pub trait PolicyEvent: Send + Sync + fmt::Debug {
    /// Short verb for what happened, e.g. "rejected" or "state_transition".
    fn kind(&self) -> &'static str;

    /// When it happened.
    fn at(&self) -> Instant;

    /// The policy it happened under.
    fn source(&self) -> &PolicySource;
}

/// The observers registered for one policy's events.
///
/// Observers are plain closures. A panicking observer is caught and
/// charged to the owning policy; the remaining observers still run.
pub struct Observers<E> {
    observers: Vec<Arc<dyn Fn(&E) + Send + Sync>>,
}

impl<E: PolicyEvent> Observers<E> {
    /// No observers.
    pub fn none() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Registers an observer.
    pub fn observe<F>(&mut self, observer: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(observer));
    }

    /// Reports `event` to every observer, isolating panics.
    pub fn notify(&self, event: &E) {
        for observer in &self.observers {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer(event);
            }));
            if outcome.is_err() {
                note_observer_panic(event);
            }
        }
    }

    /// Whether any observer is registered. Emitters can skip building
    /// events nobody will see.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }
}

impl<E: PolicyEvent> Default for Observers<E> {
    fn default() -> Self {
        Self::none()
    }
}

impl<E> Clone for Observers<E> {
    fn clone(&self) -> Self {
        Self {
            observers: self.observers.clone(),
        }
    }
}

fn note_observer_panic<E: PolicyEvent>(event: &E) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        policy = %event.source(),
        kind = event.kind(),
        "policy event observer panicked"
    );

    #[cfg(feature = "metrics")]
    metrics::counter!(
        "wicket_observer_panics_total",
        "policy" => event.source().to_string(),
        "kind" => event.kind()
    )
    .increment(1);

    #[cfg(not(any(feature = "tracing", feature = "metrics")))]
    let _ = event;
}
