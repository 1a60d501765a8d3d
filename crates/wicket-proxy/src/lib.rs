//! Backend selection and forwarding for the wicket gateway.
//!
//! [`ForwardService`] proxies buffered HTTP requests and bridged WebSocket
//! connections to one of the configured backends, chosen per request by a
//! [`LoadBalancer`]. Hop-by-hop headers are stripped in both directions;
//! upstream transport failures surface as [`ProxyError::Upstream`] (the
//! gateway's 502), while backend HTTP error statuses are relayed as
//! ordinary responses.

mod balancer;
mod error;
mod forward;
mod ws;

pub use balancer::{LbStrategy, LoadBalancer, RandomBalancer, RoundRobinBalancer};
pub use error::ProxyError;
pub use forward::{ForwardService, HOP_BY_HOP_HEADERS};
pub use ws::websocket_url;
