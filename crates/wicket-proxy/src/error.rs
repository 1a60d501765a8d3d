use thiserror::Error;

/// Errors from backend selection and forwarding.
#[derive(Debug, Clone, Error)]
pub enum ProxyError {
    /// Balancer construction requires at least one backend.
    #[error("at least one backend server is required")]
    EmptyServerList,

    /// The computed target URL did not parse.
    #[error("invalid target url: {0}")]
    InvalidTarget(String),

    /// The upstream request failed at the transport level.
    #[error("Proxy error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Upstream(err.to_string())
    }
}

impl ProxyError {
    /// Returns true for upstream transport failures (the 502 family).
    pub fn is_upstream(&self) -> bool {
        matches!(self, ProxyError::Upstream(_))
    }
}
