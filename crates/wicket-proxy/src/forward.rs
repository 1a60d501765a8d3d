//! HTTP forwarding to a chosen backend.

use std::sync::{Arc, OnceLock};

use http::header::HeaderName;
use http::HeaderMap;
#[cfg(feature = "tracing")]
use tracing::debug;
use wicket_core::{GatewayRequest, GatewayResponse};

use crate::balancer::LoadBalancer;
use crate::error::ProxyError;

/// Headers scoped to a single network hop; a proxy must not forward them
/// in either direction.
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub(crate) fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| name.as_str().eq_ignore_ascii_case(hop))
}

/// Copies `headers` minus hop-by-hop entries and `host` (the client sets
/// it from the target URL).
pub(crate) fn clean_headers(headers: &HeaderMap) -> HeaderMap {
    let mut cleaned = HeaderMap::new();
    for (name, value) in headers {
        if is_hop_by_hop(name) || *name == http::header::HOST {
            continue;
        }
        cleaned.append(name.clone(), value.clone());
    }
    cleaned
}

/// Forwards requests to backends behind a load balancer.
///
/// The upstream HTTP session is created lazily on first use and shared for
/// the life of the service.
pub struct ForwardService {
    balancer: Arc<dyn LoadBalancer>,
    client: OnceLock<reqwest::Client>,
}

impl ForwardService {
    /// Creates a forwarder choosing backends through `balancer`.
    pub fn new(balancer: Arc<dyn LoadBalancer>) -> Self {
        Self {
            balancer,
            client: OnceLock::new(),
        }
    }

    /// The balancer backing this forwarder.
    pub fn balancer(&self) -> &Arc<dyn LoadBalancer> {
        &self.balancer
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(reqwest::Client::new)
    }

    /// The target URL for `path`/`query` on the next chosen backend.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let server = self.balancer.choose();
        let mut url = format!("{}{}", server.trim_end_matches('/'), path);
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Forwards one buffered request and buffers the upstream response.
    ///
    /// Transport failures surface as [`ProxyError::Upstream`]; HTTP error
    /// statuses are NOT errors; the backend's response is relayed as-is.
    pub async fn forward_http(&self, req: &GatewayRequest) -> Result<GatewayResponse, ProxyError> {
        let target = self.target_url(req.path(), req.query());

        #[cfg(feature = "tracing")]
        debug!(method = %req.method, url = %target, "forwarding request upstream");

        let url: reqwest::Url = target
            .parse()
            .map_err(|_| ProxyError::InvalidTarget(target.clone()))?;

        let response = self
            .client()
            .request(req.method.clone(), url)
            .headers(clean_headers(&req.headers))
            .body(req.body.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = clean_headers(response.headers());
        let body = response.bytes().await?;

        Ok(GatewayResponse {
            status,
            headers,
            body,
            cache_hit: false,
        })
    }

    /// Releases the upstream session.
    pub async fn close(&self) {
        // reqwest tears its pool down on drop; nothing to flush here.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::RoundRobinBalancer;

    fn forwarder(servers: Vec<&str>) -> ForwardService {
        ForwardService::new(Arc::new(
            RoundRobinBalancer::new(servers.into_iter().map(String::from).collect()).unwrap(),
        ))
    }

    #[test]
    fn target_url_joins_path_and_query() {
        let fwd = forwarder(vec!["http://backend-a/"]);
        assert_eq!(
            fwd.target_url("/api/users", Some("page=2")),
            "http://backend-a/api/users?page=2"
        );
        assert_eq!(fwd.target_url("/health", None), "http://backend-a/health");
    }

    #[test]
    fn hop_by_hop_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("upgrade", "websocket".parse().unwrap());
        headers.insert("host", "gateway.local".parse().unwrap());
        headers.insert("x-request-id", "abc".parse().unwrap());
        headers.insert("accept", "application/json".parse().unwrap());

        let cleaned = clean_headers(&headers);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.get("x-request-id").unwrap(), "abc");
        assert_eq!(cleaned.get("accept").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_upstream_error() {
        // Nothing listens on loopback port 1; the connect fails fast.
        let fwd = forwarder(vec!["http://127.0.0.1:1"]);
        let err = fwd
            .forward_http(&GatewayRequest::get("/x"))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }
}
