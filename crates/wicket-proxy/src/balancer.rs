//! Backend selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::error::ProxyError;

/// Picks one backend URL per request.
pub trait LoadBalancer: Send + Sync {
    /// The backend the next request goes to.
    fn choose(&self) -> &str;

    /// Every configured backend.
    fn servers(&self) -> &[String];
}

/// Uniform random selection.
pub struct RandomBalancer {
    servers: Vec<String>,
}

impl RandomBalancer {
    /// Creates a balancer over `servers`; the list must be non-empty.
    pub fn new(servers: Vec<String>) -> Result<Self, ProxyError> {
        if servers.is_empty() {
            return Err(ProxyError::EmptyServerList);
        }
        Ok(Self { servers })
    }
}

impl LoadBalancer for RandomBalancer {
    fn choose(&self) -> &str {
        let index = rand::thread_rng().gen_range(0..self.servers.len());
        &self.servers[index]
    }

    fn servers(&self) -> &[String] {
        &self.servers
    }
}

/// Strict rotation starting at the first server, atomic under concurrency.
pub struct RoundRobinBalancer {
    servers: Vec<String>,
    next: AtomicUsize,
}

impl RoundRobinBalancer {
    /// Creates a balancer over `servers`; the list must be non-empty.
    pub fn new(servers: Vec<String>) -> Result<Self, ProxyError> {
        if servers.is_empty() {
            return Err(ProxyError::EmptyServerList);
        }
        Ok(Self {
            servers,
            next: AtomicUsize::new(0),
        })
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn choose(&self) -> &str {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.servers.len();
        &self.servers[index]
    }

    fn servers(&self) -> &[String] {
        &self.servers
    }
}

/// Which balancer a gateway builds for its backend list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LbStrategy {
    /// Uniform random selection.
    #[default]
    Random,
    /// Strict rotation.
    RoundRobin,
}

impl LbStrategy {
    /// Builds the balancer for `servers`.
    pub fn build(self, servers: Vec<String>) -> Result<Arc<dyn LoadBalancer>, ProxyError> {
        Ok(match self {
            LbStrategy::Random => Arc::new(RandomBalancer::new(servers)?),
            LbStrategy::RoundRobin => Arc::new(RoundRobinBalancer::new(servers)?),
        })
    }
}
