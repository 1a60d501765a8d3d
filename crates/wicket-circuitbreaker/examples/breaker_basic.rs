//! A circuit breaker around a deliberately unreliable service.
//!
//! Run with: cargo run -p wicket-circuitbreaker --example breaker_basic

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tower::{service_fn, Layer, ServiceExt};
use wicket_circuitbreaker::CircuitBreakerLayer;

#[tokio::main]
async fn main() {
    let layer = CircuitBreakerLayer::<&'static str>::builder()
        .failure_threshold(3)
        .recovery_timeout(Duration::from_millis(200))
        .name("demo")
        .on_state_transition(|from, to| println!("  circuit: {from:?} -> {to:?}"))
        .build();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let service = layer.layer(service_fn(move |req: u32| {
        let c = Arc::clone(&c);
        async move {
            // The backend recovers after its fifth invocation.
            if c.fetch_add(1, Ordering::SeqCst) < 5 {
                Err("backend down")
            } else {
                Ok(req * 2)
            }
        }
    }));

    for i in 0..8 {
        match service.clone().oneshot(i).await {
            Ok(value) => println!("call {i}: ok({value})"),
            Err(err) if err.is_open() => {
                println!("call {i}: rejected, circuit open");
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            Err(err) => println!("call {i}: failed ({err})"),
        }
    }
}
