//! The throttler facade: algorithms bound to storage and a clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use wicket_core::clock::Clock;
use wicket_storage::KvStore;

use crate::algo::{self, Admission, ThrottleState};
use crate::error::ThrottleError;
use crate::ThrottleAlgo;

/// Runs admission checks against shared storage.
///
/// A throttler is a constructed object owned by its gateway; there is no
/// process-wide instance, so tests build fresh ones freely. Check-and-update
/// is serialized under an internal mutex, making per-key admission sequences
/// linearizable. A distributed store must provide the same atomicity on the
/// server side instead.
pub struct Throttler {
    store: Arc<dyn KvStore<ThrottleState>>,
    clock: Arc<dyn Clock>,
    keyspace: String,
    gate: Mutex<()>,
}

impl Throttler {
    /// Creates a throttler namespacing its keys under `keyspace`.
    pub fn new(
        store: Arc<dyn KvStore<ThrottleState>>,
        clock: Arc<dyn Clock>,
        keyspace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            keyspace: keyspace.into(),
            gate: Mutex::new(()),
        }
    }

    /// The keyspace prefix applied to every storage key.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Builds the full storage key for a policy scope.
    pub fn key_for(&self, algo: ThrottleAlgo, scope: &str) -> String {
        format!("{}:throttle:{}:{}", self.keyspace, algo, scope)
    }

    /// Runs one admission check for `algo` under `key`.
    ///
    /// `bucket_size` applies to the leaky bucket only and defaults to the
    /// quota. Never sleeps; a non-granted outcome carries the wait.
    pub async fn acquire(
        &self,
        algo: ThrottleAlgo,
        key: &str,
        quota: u64,
        duration: Duration,
        bucket_size: Option<u64>,
    ) -> Result<Admission, ThrottleError> {
        let _guard = self.gate.lock().await;
        let now = self.clock.now().as_secs_f64();
        let duration_s = duration.as_secs_f64();
        let state = self.store.get(key).await?;

        let decision = match algo {
            ThrottleAlgo::FixedWindow => algo::fixed_window(state, now, quota, duration_s),
            ThrottleAlgo::SlidingWindow => algo::sliding_window(state, now, quota, duration_s),
            ThrottleAlgo::TokenBucket => algo::token_bucket(state, now, quota, duration_s),
            ThrottleAlgo::LeakyBucket => algo::leaky_bucket(
                state,
                now,
                quota,
                duration_s,
                bucket_size.unwrap_or(quota),
            )?,
        };

        if let Some(next) = decision.write {
            self.store.set(key, next, None).await?;
        }
        Ok(decision.admission)
    }

    /// Fixed-window admission check.
    pub async fn fixed_window(
        &self,
        key: &str,
        quota: u64,
        duration: Duration,
    ) -> Result<Admission, ThrottleError> {
        self.acquire(ThrottleAlgo::FixedWindow, key, quota, duration, None)
            .await
    }

    /// Sliding-window admission check.
    pub async fn sliding_window(
        &self,
        key: &str,
        quota: u64,
        duration: Duration,
    ) -> Result<Admission, ThrottleError> {
        self.acquire(ThrottleAlgo::SlidingWindow, key, quota, duration, None)
            .await
    }

    /// Token-bucket admission check.
    pub async fn token_bucket(
        &self,
        key: &str,
        quota: u64,
        duration: Duration,
    ) -> Result<Admission, ThrottleError> {
        self.acquire(ThrottleAlgo::TokenBucket, key, quota, duration, None)
            .await
    }

    /// Leaky-bucket admission check.
    pub async fn leaky_bucket(
        &self,
        key: &str,
        quota: u64,
        duration: Duration,
        bucket_size: u64,
    ) -> Result<Admission, ThrottleError> {
        self.acquire(
            ThrottleAlgo::LeakyBucket,
            key,
            quota,
            duration,
            Some(bucket_size),
        )
        .await
    }

    /// Drops all throttle state under this throttler's keyspace.
    pub async fn clear(&self) -> Result<(), ThrottleError> {
        let _guard = self.gate.lock().await;
        self.store.clear(&self.keyspace).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_core::clock::ManualClock;
    use wicket_storage::MemoryStore;

    fn throttler(clock: ManualClock) -> Throttler {
        Throttler::new(
            Arc::new(MemoryStore::with_clock(Arc::new(clock.clone()))),
            Arc::new(clock),
            "test",
        )
    }

    #[tokio::test]
    async fn fixed_window_quota_enforced_per_key() {
        let clock = ManualClock::new();
        let t = throttler(clock.clone());
        let window = Duration::from_secs(60);

        for _ in 0..3 {
            let adm = t.fixed_window("a", 3, window).await.unwrap();
            assert!(adm.is_granted());
        }
        let adm = t.fixed_window("a", 3, window).await.unwrap();
        assert!(!adm.is_granted());

        // A different key has its own window.
        let adm = t.fixed_window("b", 3, window).await.unwrap();
        assert!(adm.is_granted());
    }

    #[tokio::test]
    async fn fixed_window_recovers_after_duration() {
        let clock = ManualClock::new();
        let t = throttler(clock.clone());
        let window = Duration::from_secs(10);

        assert!(t.fixed_window("k", 1, window).await.unwrap().is_granted());
        assert!(!t.fixed_window("k", 1, window).await.unwrap().is_granted());

        clock.advance(Duration::from_secs(11));
        assert!(t.fixed_window("k", 1, window).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn token_bucket_refills_on_schedule() {
        let clock = ManualClock::new();
        let t = throttler(clock.clone());
        let duration = Duration::from_secs(10);

        // quota 2 over 10s: two immediate grants, then dry.
        assert!(t.token_bucket("k", 2, duration).await.unwrap().is_granted());
        assert!(t.token_bucket("k", 2, duration).await.unwrap().is_granted());
        let adm = t.token_bucket("k", 2, duration).await.unwrap();
        let wait = adm.retry_after().unwrap();
        assert!((wait.as_secs_f64() - 5.0).abs() < 1e-9);

        clock.advance(Duration::from_secs(5));
        assert!(t.token_bucket("k", 2, duration).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn leaky_bucket_reports_queue_position() {
        let clock = ManualClock::new();
        let t = throttler(clock.clone());
        let duration = Duration::from_secs(1);

        assert!(t
            .leaky_bucket("k", 2, duration, 3)
            .await
            .unwrap()
            .is_granted());
        let adm = t.leaky_bucket("k", 2, duration, 3).await.unwrap();
        assert!((adm.retry_after().unwrap().as_secs_f64() - 0.5).abs() < 1e-9);
        let adm = t.leaky_bucket("k", 2, duration, 3).await.unwrap();
        assert!((adm.retry_after().unwrap().as_secs_f64() - 1.0).abs() < 1e-9);

        let err = t.leaky_bucket("k", 2, duration, 3).await.unwrap_err();
        assert!(matches!(err, ThrottleError::BucketFull { bucket_size: 3 }));
    }

    #[tokio::test]
    async fn clear_resets_all_keys_in_keyspace() {
        let clock = ManualClock::new();
        let t = throttler(clock.clone());
        let window = Duration::from_secs(60);

        let key = t.key_for(ThrottleAlgo::FixedWindow, "path:/a");
        assert!(t.fixed_window(&key, 1, window).await.unwrap().is_granted());
        assert!(!t.fixed_window(&key, 1, window).await.unwrap().is_granted());

        t.clear().await.unwrap();
        assert!(t.fixed_window(&key, 1, window).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn key_for_namespaces_by_algorithm() {
        let clock = ManualClock::new();
        let t = throttler(clock);
        assert_eq!(
            t.key_for(ThrottleAlgo::TokenBucket, "path:/api/*"),
            "test:throttle:token_bucket:path:/api/*"
        );
    }
}
