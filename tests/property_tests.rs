//! Property tests over the admission algorithms, balancer fairness and
//! permission matching.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use wicket_auth::Permission;
use wicket_core::clock::ManualClock;
use wicket_core::Clock;
use wicket_proxy::{LoadBalancer, RoundRobinBalancer};
use wicket_storage::MemoryStore;
use wicket_throttle::Throttler;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
}

fn throttler(clock: &ManualClock) -> Throttler {
    Throttler::new(
        Arc::new(MemoryStore::with_clock(Arc::new(clock.clone()))),
        Arc::new(clock.clone()),
        "prop",
    )
}

proptest! {
    #[test]
    fn fixed_window_grants_min_of_calls_and_quota(
        quota in 0u64..32,
        calls in 1usize..64,
    ) {
        runtime().block_on(async move {
            let clock = ManualClock::new();
            let t = throttler(&clock);
            let duration = Duration::from_secs(60);

            let mut granted = 0u64;
            for _ in 0..calls {
                if t.fixed_window("k", quota, duration).await.unwrap().is_granted() {
                    granted += 1;
                }
            }
            prop_assert_eq!(granted, quota.min(calls as u64));
            Ok(())
        })?;
    }

    #[test]
    fn token_bucket_respects_the_refill_bound(
        quota in 1u64..16,
        durations in 1u64..4,
        step_ms in 50u64..500,
    ) {
        runtime().block_on(async move {
            let clock = ManualClock::new();
            let t = throttler(&clock);
            let duration = Duration::from_secs(10);
            let horizon = duration * durations as u32;

            let mut granted = 0u64;
            while clock.now() < horizon {
                if t.token_bucket("k", quota, duration).await.unwrap().is_granted() {
                    granted += 1;
                }
                clock.advance(Duration::from_millis(step_ms));
            }
            // Initial burst plus one quota per elapsed duration.
            prop_assert!(granted <= quota + durations * quota);
            Ok(())
        })?;
    }

    #[test]
    fn sliding_window_state_never_exceeds_quota(
        quota in 1u64..16,
        steps in proptest::collection::vec(0u64..5000, 1..64),
    ) {
        runtime().block_on(async move {
            let clock = ManualClock::new();
            let t = throttler(&clock);
            let duration = Duration::from_secs(10);

            let mut live_grants: Vec<Duration> = Vec::new();
            for step in steps {
                clock.advance(Duration::from_millis(step));
                if t.sliding_window("k", quota, duration).await.unwrap().is_granted() {
                    live_grants.push(clock.now());
                }
            }
            // The smoothing is an approximation, not per-event history:
            // any interval one window long sees at most two windows'
            // worth of admissions (it can straddle two counting spans).
            for (i, start) in live_grants.iter().enumerate() {
                let in_window = live_grants[i..]
                    .iter()
                    .take_while(|at| **at < *start + duration)
                    .count() as u64;
                prop_assert!(in_window <= 2 * quota);
            }
            Ok(())
        })?;
    }

    #[test]
    fn round_robin_is_fair_over_full_cycles(
        n in 1usize..12,
        cycles in 1usize..8,
    ) {
        let servers: Vec<String> = (0..n).map(|i| format!("http://s{i}")).collect();
        let lb = RoundRobinBalancer::new(servers.clone()).unwrap();

        for _ in 0..cycles {
            let mut seen = std::collections::HashSet::new();
            for _ in 0..n {
                seen.insert(lb.choose().to_string());
            }
            prop_assert_eq!(seen.len(), n);
        }
    }

    #[test]
    fn literal_permissions_match_themselves(
        action in "[a-z0-9_]{1,12}",
        resource in "[a-z0-9_]{1,12}",
    ) {
        let name = format!("{action}:{resource}");
        let permission = Permission::new(name.clone()).unwrap();
        prop_assert!(permission.matches(&name));
        let mismatched = format!("{}x", name);
        prop_assert!(!permission.matches(&mismatched));

        let action_wildcard = Permission::new(format!("{action}:*")).unwrap();
        prop_assert!(action_wildcard.matches(&name));

        let total_wildcard = Permission::new("*:*").unwrap();
        prop_assert!(total_wildcard.matches(&name));
    }
}
