//! The gateway's aggregate error and its HTTP mapping.
//!
//! Layer errors are flattened into [`GatewayError`] as the composed chain
//! is built, so the retry and circuit-breaker classifiers see one type.
//! Errors never escape the dispatcher: it converts them into the JSON
//! responses below.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;
use wicket_auth::AuthError;
use wicket_core::GatewayResponse;
use wicket_proxy::ProxyError;
use wicket_storage::StoreError;

/// Everything that can go wrong inside a composed handler chain.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rate-limit quota exhausted.
    #[error("{message}")]
    QuotaExceeded {
        retry_after: Duration,
        status: StatusCode,
        message: String,
    },

    /// Leaky bucket at capacity.
    #[error("{message}")]
    BucketFull {
        status: StatusCode,
        message: String,
    },

    /// The path's circuit breaker is open.
    #[error("Service unavailable")]
    CircuitOpen {
        /// Time until the breaker admits a probe.
        retry_after: Duration,
    },

    /// The request deadline expired.
    #[error("{message}")]
    DeadlineExceeded {
        status: StatusCode,
        message: String,
    },

    /// Authentication or authorization rejected the request.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The cache/throttle store failed.
    #[error("Storage unavailable")]
    Storage(#[from] StoreError),

    /// The upstream request failed at the transport level.
    #[error("Proxy error: {0}")]
    Upstream(String),

    /// The locally mounted handler failed.
    #[error("Internal server error")]
    Internal(String),
}

impl GatewayError {
    /// The HTTP status this error surfaces as.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::QuotaExceeded { status, .. } => *status,
            GatewayError::BucketFull { status, .. } => *status,
            GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::DeadlineExceeded { status, .. } => *status,
            GatewayError::Auth(err) if err.is_access_denied() => StatusCode::FORBIDDEN,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a retry layer should re-attempt after this error.
    ///
    /// Only backend failures retry; policy rejections (429, 401/403,
    /// open circuit, expired deadline) are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Upstream(_) | GatewayError::Internal(_) | GatewayError::Storage(_)
        )
    }

    /// Whether a circuit breaker should count this error as a failure.
    ///
    /// Same set as [`Self::is_retryable`]: a rate-limited or unauthorized
    /// call says nothing about backend health.
    pub fn is_breaker_failure(&self) -> bool {
        self.is_retryable()
    }

    /// The wait a client should observe before trying again, for the
    /// rejections that know one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::QuotaExceeded { retry_after, .. }
            | GatewayError::CircuitOpen { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// The JSON error response for this error, with a `Retry-After`
    /// header when a wait is known.
    pub fn to_response(&self) -> GatewayResponse {
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        let mut resp = GatewayResponse::json(self.status(), body);
        if let Some(wait) = self.retry_after() {
            let secs = wait.as_secs().max(1).to_string();
            if let Ok(value) = http::HeaderValue::from_str(&secs) {
                resp.headers.insert(http::header::RETRY_AFTER, value);
            }
        }
        resp
    }
}

impl From<ProxyError> for GatewayError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Upstream(message) => GatewayError::Upstream(message),
            ProxyError::InvalidTarget(url) => {
                GatewayError::Upstream(format!("invalid target url: {url}"))
            }
            ProxyError::EmptyServerList => {
                GatewayError::Internal("no backend servers configured".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_auth::TokenErrorKind;

    #[test]
    fn status_mapping() {
        let quota = GatewayError::QuotaExceeded {
            retry_after: Duration::from_secs(1),
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limit exceeded".to_string(),
        };
        assert_eq!(quota.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            GatewayError::CircuitOpen {
                retry_after: Duration::from_secs(30)
            }
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::Upstream("refused".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Auth(AuthError::InvalidToken(TokenErrorKind::Expired)).status(),
            StatusCode::UNAUTHORIZED
        );
        let denied = GatewayError::Auth(AuthError::AccessDenied {
            user: "alice".into(),
            path: "/x".into(),
            required: vec![],
            granted: vec![],
        });
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn policy_rejections_never_retry_or_trip_the_breaker() {
        let quota = GatewayError::QuotaExceeded {
            retry_after: Duration::ZERO,
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limit exceeded".to_string(),
        };
        assert!(!quota.is_retryable());
        assert!(!GatewayError::CircuitOpen {
            retry_after: Duration::ZERO
        }
        .is_retryable());
        assert!(!GatewayError::Auth(AuthError::InvalidCredentials).is_breaker_failure());

        assert!(GatewayError::Upstream("down".into()).is_retryable());
        assert!(GatewayError::Internal("bug".into()).is_breaker_failure());
    }

    #[test]
    fn json_body_carries_the_message() {
        let err = GatewayError::QuotaExceeded {
            retry_after: Duration::ZERO,
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limit exceeded".to_string(),
        };
        let resp = err.to_response();
        assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.body, r#"{"error":"Rate limit exceeded"}"#.as_bytes());

        let upstream = GatewayError::Upstream("connection refused".into()).to_response();
        assert_eq!(
            upstream.body,
            r#"{"error":"Proxy error: connection refused"}"#.as_bytes()
        );
    }

    #[test]
    fn waiting_rejections_carry_a_retry_after_header() {
        let open = GatewayError::CircuitOpen {
            retry_after: Duration::from_secs(12),
        }
        .to_response();
        assert_eq!(open.headers.get(http::header::RETRY_AFTER).unwrap(), "12");

        // Sub-second waits round up rather than advertising zero.
        let quota = GatewayError::QuotaExceeded {
            retry_after: Duration::from_millis(200),
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "Rate limit exceeded".to_string(),
        }
        .to_response();
        assert_eq!(quota.headers.get(http::header::RETRY_AFTER).unwrap(), "1");

        let upstream = GatewayError::Upstream("down".into()).to_response();
        assert!(upstream.headers.get(http::header::RETRY_AFTER).is_none());
    }
}
