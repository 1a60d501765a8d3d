//! Core infrastructure shared by every wicket crate.
//!
//! This crate provides the pieces the feature crates have in common:
//! - Policy telemetry: per-policy observer sets keyed by compiled-feature
//!   identity
//! - An injectable monotonic clock so time-based policies are testable
//! - The request/response model carried through a composed gateway chain

pub mod clock;
pub mod events;
pub mod http;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use events::{Observers, PolicyEvent, PolicySource};
pub use http::{GatewayRequest, GatewayResponse};
