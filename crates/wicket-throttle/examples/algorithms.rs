//! Exercises the four admission algorithms against one throttler.
//!
//! Run with: cargo run -p wicket-throttle --example algorithms

use std::sync::Arc;
use std::time::Duration;

use wicket_core::clock::MonotonicClock;
use wicket_storage::MemoryStore;
use wicket_throttle::{Admission, ThrottleAlgo, Throttler};

#[tokio::main]
async fn main() {
    let throttler = Throttler::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MonotonicClock::new()),
        "demo",
    );

    for algo in [
        ThrottleAlgo::FixedWindow,
        ThrottleAlgo::SlidingWindow,
        ThrottleAlgo::TokenBucket,
        ThrottleAlgo::LeakyBucket,
    ] {
        println!("--- {algo} (quota 3 per 2s) ---");
        let key = throttler.key_for(algo, "example");
        for attempt in 1..=5 {
            let outcome = throttler
                .acquire(algo, &key, 3, Duration::from_secs(2), Some(3))
                .await;
            match outcome {
                Ok(Admission::Granted) => println!("  call {attempt}: granted"),
                Ok(Admission::RetryAfter(wait)) => {
                    println!("  call {attempt}: retry in {:.2}s", wait.as_secs_f64())
                }
                Err(err) => println!("  call {attempt}: {err}"),
            }
        }
    }
}
