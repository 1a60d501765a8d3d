//! A self-contained gateway in front of a local echo backend.
//!
//! Run with: cargo run -p wicket-gateway --example gateway_demo
//! Then try:
//!   curl -i http://127.0.0.1:8080/api/hello     (rate limited: 5 per 10s)
//!   curl -i http://127.0.0.1:8080/cached        (second hit is replayed)
//!   curl -i http://127.0.0.1:8080/wicket/dashboard/api/stats

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use wicket_gateway::{serve, Gateway, GatewayConfig};
use wicket_proxy::LbStrategy;

const CONFIG: &str = r#"
wicket:
  keyspace: demo-gateway
  paths:
    - pattern: "/api/*"
      features:
        rate_limit:
          quota: 5
          duration: 10
          algorithm: token_bucket
        timeout:
          seconds: 5.0
        monitoring:
          log_threshold: 0.2
    - pattern: "/cached"
      features:
        cache:
          expire_s: 30
"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    // A stand-in backend on an ephemeral port.
    let backend = TcpListener::bind("127.0.0.1:0").await?;
    let backend_url = format!("http://{}", backend.local_addr()?);
    let echo = Router::new().fallback(|req: axum::extract::Request| async move {
        format!("backend saw {} {}\n", req.method(), req.uri().path())
    });
    tokio::spawn(async move {
        axum::serve(backend, echo).await.unwrap();
    });

    let config = GatewayConfig::from_yaml_str(CONFIG, "wicket")?;
    let gateway = Arc::new(
        Gateway::builder(config)
            .servers(vec![backend_url])
            .load_balancer(LbStrategy::RoundRobin)
            .build()?,
    );

    let listener = TcpListener::bind("127.0.0.1:8080").await?;
    println!("gateway listening on http://{}", listener.local_addr()?);
    serve::serve(gateway, listener).await?;
    Ok(())
}
