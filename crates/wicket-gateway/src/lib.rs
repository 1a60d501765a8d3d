//! An API gateway that fronts HTTP/WebSocket backends with composable
//! per-path policies: authentication with RBAC, response caching, four
//! rate-limiting algorithms, bounded retries, circuit breaking,
//! per-request timeouts and latency monitoring, routed through a
//! pluggable load balancer.
//!
//! Configuration declares an ordered list of path patterns, each carrying
//! a feature bundle; the compiler turns every bundle into a precomputed
//! policy and the dispatcher folds the feature layers over the downstream
//! handler in a fixed order (see [`compose`]). Composed handlers are
//! built lazily per policy and memoized until shutdown.
//!
//! ## Basic Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wicket_gateway::{serve, Gateway, GatewayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_file("gateway.yaml", "wicket").await?;
//! let gateway = Arc::new(Gateway::builder(config).build()?);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! serve::serve(gateway, listener).await?;
//! # Ok(())
//! # }
//! ```

pub mod compile;
pub mod compose;
pub mod config;
pub mod dashboard;
pub mod error;
mod gateway;
mod monitor;
pub mod serve;
pub mod stats;

pub use compose::Handler;
pub use config::{ConfigError, FeatureConfig, GatewayConfig, PathConfig};
pub use error::GatewayError;
pub use gateway::{Gateway, GatewayBuilder};
pub use stats::{RequestRecord, StatsRecorder, StatsSnapshot};
