//! The four admission algorithms.
//!
//! Each algorithm is a pure function of the stored state, the current time
//! and the policy parameters; it returns the next state to write (if any)
//! and the admission outcome. Time is `f64` seconds from the clock origin.
//! Token and leak refills are quantized to whole units (`floor`) so
//! admission sequences are exactly reproducible in tests.

use std::time::Duration;

use crate::error::ThrottleError;

/// Stored throttle state, one variant per algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleState {
    /// Fixed window: end of the current window and admissions within it.
    FixedWindow { window_end: f64, count: u64 },
    /// Sliding window: window anchor and the leaky admission count.
    SlidingWindow { anchor: f64, count: u64 },
    /// Token bucket: last refill time and whole tokens remaining.
    TokenBucket { last_refill: f64, tokens: u64 },
    /// Leaky bucket: last leak time and the current bucket level.
    LeakyBucket { last_leak: f64, count: u64 },
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed now.
    Granted,
    /// The request must wait this long before the next attempt can succeed.
    RetryAfter(Duration),
}

impl Admission {
    /// Returns true when the request was admitted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }

    /// The wait before the next attempt, when not admitted.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Admission::Granted => None,
            Admission::RetryAfter(wait) => Some(*wait),
        }
    }
}

/// An algorithm step: the state to persist (if any) and the outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Decision {
    pub write: Option<ThrottleState>,
    pub admission: Admission,
}

impl Decision {
    fn grant(state: ThrottleState) -> Self {
        Self {
            write: Some(state),
            admission: Admission::Granted,
        }
    }

    fn reject(secs: f64) -> Self {
        Self {
            write: None,
            admission: Admission::RetryAfter(to_wait(secs)),
        }
    }
}

/// Converts a computed wait in seconds to a `Duration`, absorbing the
/// degenerate cases (`quota = 0` divisions produce infinities).
fn to_wait(secs: f64) -> Duration {
    if !secs.is_finite() || secs >= 1e15 {
        Duration::MAX
    } else if secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(secs)
    }
}

pub(crate) fn fixed_window(
    state: Option<ThrottleState>,
    now: f64,
    quota: u64,
    duration: f64,
) -> Decision {
    let fresh = |now: f64| {
        if quota >= 1 {
            Decision::grant(ThrottleState::FixedWindow {
                window_end: now + duration,
                count: 1,
            })
        } else {
            Decision {
                write: Some(ThrottleState::FixedWindow {
                    window_end: now + duration,
                    count: 0,
                }),
                admission: Admission::RetryAfter(to_wait(duration)),
            }
        }
    };

    match state {
        Some(ThrottleState::FixedWindow { window_end, count }) => {
            if now > window_end {
                // Boundary admissions tie-break into the new window.
                fresh(now)
            } else if count >= quota {
                Decision::reject(window_end - now)
            } else {
                Decision::grant(ThrottleState::FixedWindow {
                    window_end,
                    count: count + 1,
                })
            }
        }
        _ => fresh(now),
    }
}

pub(crate) fn sliding_window(
    state: Option<ThrottleState>,
    now: f64,
    quota: u64,
    duration: f64,
) -> Decision {
    let (anchor, count) = match state {
        Some(ThrottleState::SlidingWindow { anchor, count }) => (anchor, count),
        _ => (now, 0),
    };

    let elapsed = (now - anchor).max(0.0);
    if quota >= 1 && elapsed >= duration {
        // One or more full windows have passed; start over.
        return Decision::grant(ThrottleState::SlidingWindow {
            anchor: now,
            count: 1,
        });
    }

    let progress = if duration > 0.0 {
        elapsed % duration
    } else {
        0.0
    };
    let windows_passed = if duration > 0.0 {
        (elapsed / duration).floor() as u64
    } else {
        0
    };
    let effective = count.saturating_sub(windows_passed.saturating_mul(quota));

    if effective >= quota {
        let overhang = (effective - quota + 1) as f64 / quota as f64;
        Decision::reject((duration - progress) + overhang * duration)
    } else {
        Decision::grant(ThrottleState::SlidingWindow {
            anchor: now - progress,
            count: effective + 1,
        })
    }
}

pub(crate) fn token_bucket(
    state: Option<ThrottleState>,
    now: f64,
    quota: u64,
    duration: f64,
) -> Decision {
    let (last_refill, tokens) = match state {
        Some(ThrottleState::TokenBucket {
            last_refill,
            tokens,
        }) => (last_refill, tokens),
        _ => (now, quota),
    };

    let refill_rate = quota as f64 / duration;
    let elapsed = (now - last_refill).max(0.0);
    let refilled = (elapsed * refill_rate).floor() as u64;
    let tokens = tokens.saturating_add(refilled).min(quota);

    if tokens < 1 {
        Decision::reject(1.0 / refill_rate)
    } else {
        Decision::grant(ThrottleState::TokenBucket {
            last_refill: now,
            tokens: tokens - 1,
        })
    }
}

pub(crate) fn leaky_bucket(
    state: Option<ThrottleState>,
    now: f64,
    quota: u64,
    duration: f64,
    bucket_size: u64,
) -> Result<Decision, ThrottleError> {
    let (last_leak, count) = match state {
        Some(ThrottleState::LeakyBucket { last_leak, count }) => (last_leak, count),
        _ => (now, 0),
    };

    let leak_rate = quota as f64 / duration;
    let elapsed = (now - last_leak).max(0.0);
    let leaked = (elapsed * leak_rate).floor() as u64;
    let count = count.saturating_sub(leaked);

    if count >= bucket_size {
        return Err(ThrottleError::BucketFull { bucket_size });
    }

    if count == 0 {
        Ok(Decision::grant(ThrottleState::LeakyBucket {
            last_leak: now,
            count: 1,
        }))
    } else {
        // Queued behind `count` earlier admissions; report the position
        // delay but record the enqueue either way.
        Ok(Decision {
            write: Some(ThrottleState::LeakyBucket {
                last_leak: now,
                count: count + 1,
            }),
            admission: Admission::RetryAfter(to_wait(count as f64 / leak_rate)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granted(d: &Decision) -> bool {
        d.admission.is_granted()
    }

    fn wait_secs(d: &Decision) -> f64 {
        d.admission.retry_after().expect("expected rejection").as_secs_f64()
    }

    // ==================== Fixed window ====================

    #[test]
    fn fixed_window_admits_up_to_quota() {
        let mut state = None;
        for _ in 0..3 {
            let d = fixed_window(state, 10.0, 3, 60.0);
            assert!(granted(&d));
            state = d.write;
        }

        let d = fixed_window(state, 10.5, 3, 60.0);
        assert!(!granted(&d));
        // Window opened at t=10, so 59.5s remain.
        assert!((wait_secs(&d) - 59.5).abs() < 1e-9);
    }

    #[test]
    fn fixed_window_resets_after_boundary() {
        let d = fixed_window(None, 0.0, 1, 10.0);
        let d = fixed_window(d.write, 1.0, 1, 10.0);
        assert!(!granted(&d));

        // Strictly past the window end: fresh window, fresh quota.
        let d = fixed_window(d.write.or(Some(ThrottleState::FixedWindow {
            window_end: 10.0,
            count: 1,
        })), 10.1, 1, 10.0);
        assert!(granted(&d));
        assert_eq!(
            d.write,
            Some(ThrottleState::FixedWindow {
                window_end: 20.1,
                count: 1
            })
        );
    }

    #[test]
    fn fixed_window_zero_quota_rejects_every_call() {
        let d = fixed_window(None, 0.0, 0, 60.0);
        assert!(!granted(&d));
        assert_eq!(
            d.write,
            Some(ThrottleState::FixedWindow {
                window_end: 60.0,
                count: 0
            })
        );

        let d = fixed_window(d.write, 30.0, 0, 60.0);
        assert!(!granted(&d));
    }

    #[test]
    fn fixed_window_count_never_exceeds_quota() {
        let mut state = None;
        for i in 0..20 {
            let d = fixed_window(state, i as f64 * 0.1, 5, 60.0);
            if let Some(ThrottleState::FixedWindow { count, .. }) = d.write.or(state) {
                assert!(count <= 5);
            }
            if d.write.is_some() {
                state = d.write;
            }
        }
    }

    // ==================== Sliding window ====================

    #[test]
    fn sliding_window_admits_then_smooths() {
        let mut state = None;
        for _ in 0..2 {
            let d = sliding_window(state, 0.0, 2, 10.0);
            assert!(granted(&d));
            state = d.write;
        }

        let d = sliding_window(state, 1.0, 2, 10.0);
        assert!(!granted(&d));
        // remains = (10 - 1) + (1/2)*10 = 14
        assert!((wait_secs(&d) - 14.0).abs() < 1e-9);
    }

    #[test]
    fn sliding_window_resets_after_full_window() {
        let mut state = None;
        for _ in 0..2 {
            let d = sliding_window(state, 0.0, 2, 10.0);
            state = d.write;
        }

        let d = sliding_window(state, 11.0, 2, 10.0);
        assert!(granted(&d));
        assert_eq!(
            d.write,
            Some(ThrottleState::SlidingWindow {
                anchor: 11.0,
                count: 1
            })
        );
    }

    #[test]
    fn sliding_window_state_stays_within_quota_after_grant() {
        let mut state = None;
        let mut t = 0.0;
        for _ in 0..50 {
            let d = sliding_window(state, t, 4, 10.0);
            if let Some(ThrottleState::SlidingWindow { count, .. }) = d.write {
                assert!(count <= 4);
            }
            if d.write.is_some() {
                state = d.write;
            }
            t += 0.5;
        }
    }

    #[test]
    fn sliding_window_zero_quota_rejects_with_positive_wait() {
        let d = sliding_window(None, 5.0, 0, 10.0);
        assert!(!granted(&d));
        assert!(wait_secs(&d) > 0.0);
    }

    // ==================== Token bucket ====================

    #[test]
    fn token_bucket_starts_full() {
        let mut state = None;
        for _ in 0..5 {
            let d = token_bucket(state, 0.0, 5, 10.0);
            assert!(granted(&d));
            state = d.write;
        }
        let d = token_bucket(state, 0.0, 5, 10.0);
        assert!(!granted(&d));
        // Refill rate 0.5/s: next token in 2s.
        assert!((wait_secs(&d) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn token_bucket_refill_is_quantized() {
        // Drain the single token.
        let d = token_bucket(None, 0.0, 1, 10.0);
        assert!(granted(&d));
        let state = d.write;

        // 9.9s elapsed: floor(0.99 tokens) = 0, still dry.
        let d = token_bucket(state, 9.9, 1, 10.0);
        assert!(!granted(&d));

        // 10s elapsed: exactly one whole token.
        let d = token_bucket(state, 10.0, 1, 10.0);
        assert!(granted(&d));
        assert_eq!(
            d.write,
            Some(ThrottleState::TokenBucket {
                last_refill: 10.0,
                tokens: 0
            })
        );
    }

    #[test]
    fn token_bucket_never_exceeds_capacity() {
        let d = token_bucket(None, 0.0, 3, 1.0);
        let state = d.write;

        // A long idle period refills to capacity, not beyond.
        let d = token_bucket(state, 100.0, 3, 1.0);
        assert!(granted(&d));
        assert_eq!(
            d.write,
            Some(ThrottleState::TokenBucket {
                last_refill: 100.0,
                tokens: 2
            })
        );
    }

    #[test]
    fn token_bucket_zero_quota_rejects_every_call() {
        let d = token_bucket(None, 0.0, 0, 10.0);
        assert!(!granted(&d));
        let d = token_bucket(None, 50.0, 0, 10.0);
        assert!(!granted(&d));
    }

    // ==================== Leaky bucket ====================

    #[test]
    fn leaky_bucket_first_call_runs_immediately() {
        let d = leaky_bucket(None, 0.0, 2, 1.0, 4).unwrap();
        assert!(granted(&d));
        assert_eq!(
            d.write,
            Some(ThrottleState::LeakyBucket {
                last_leak: 0.0,
                count: 1
            })
        );
    }

    #[test]
    fn leaky_bucket_queues_with_position_delay() {
        let d = leaky_bucket(None, 0.0, 2, 1.0, 4).unwrap();
        let d = leaky_bucket(d.write, 0.0, 2, 1.0, 4).unwrap();
        assert!(!granted(&d));
        // One ahead in the bucket, leak rate 2/s: 0.5s delay.
        assert!((wait_secs(&d) - 0.5).abs() < 1e-9);
        assert_eq!(
            d.write,
            Some(ThrottleState::LeakyBucket {
                last_leak: 0.0,
                count: 2
            })
        );
    }

    #[test]
    fn leaky_bucket_full_fails() {
        let mut state = None;
        for _ in 0..3 {
            let d = leaky_bucket(state, 0.0, 1, 1.0, 3).unwrap();
            state = d.write;
        }
        let err = leaky_bucket(state, 0.0, 1, 1.0, 3).unwrap_err();
        assert!(matches!(err, ThrottleError::BucketFull { bucket_size: 3 }));
    }

    #[test]
    fn leaky_bucket_drains_over_time() {
        let mut state = None;
        for _ in 0..3 {
            let d = leaky_bucket(state, 0.0, 1, 1.0, 3).unwrap();
            state = d.write;
        }

        // Two seconds drain two slots.
        let d = leaky_bucket(state, 2.0, 1, 1.0, 3).unwrap();
        assert!(!granted(&d));
        assert_eq!(
            d.write,
            Some(ThrottleState::LeakyBucket {
                last_leak: 2.0,
                count: 2
            })
        );
    }

    #[test]
    fn leaky_bucket_level_never_exceeds_bucket_size() {
        let mut state = None;
        for t in 0..20 {
            match leaky_bucket(state, t as f64 * 0.1, 2, 1.0, 3) {
                Ok(d) => {
                    if let Some(ThrottleState::LeakyBucket { count, .. }) = d.write {
                        assert!(count <= 3);
                        state = d.write;
                    }
                }
                Err(ThrottleError::BucketFull { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn leaky_bucket_zero_quota_is_always_full() {
        let err = leaky_bucket(None, 0.0, 0, 1.0, 0).unwrap_err();
        assert!(matches!(err, ThrottleError::BucketFull { .. }));
    }

    #[test]
    fn degenerate_waits_are_clamped() {
        assert_eq!(to_wait(f64::INFINITY), Duration::MAX);
        assert_eq!(to_wait(-1.0), Duration::ZERO);
        assert_eq!(to_wait(2.5), Duration::from_secs_f64(2.5));
    }
}
