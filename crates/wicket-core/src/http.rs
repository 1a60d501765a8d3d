//! The request/response model carried through a composed gateway chain.
//!
//! Bodies are fully buffered [`Bytes`] so layers can capture, replay and
//! retry messages without re-reading a stream; the server edge re-chunks
//! bodies toward the client. Both types are cheap to clone (`Bytes` is
//! reference-counted), which is what lets the retry layer re-issue a
//! request verbatim.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode, Uri, Version};

/// A buffered HTTP request flowing through the gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayRequest {
    /// Creates a request with the given method and URI and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Convenience constructor for a GET request to `uri`.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid URI; intended for tests and examples.
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri.parse().expect("invalid uri"))
    }

    /// Replaces the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header, panicking on invalid input; intended for tests.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name: HeaderName = name.parse().expect("invalid header name");
        let value: HeaderValue = value.parse().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// The request path component.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }
}

/// A buffered HTTP response flowing back through the gateway.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Set by the response cache when this response was replayed from
    /// storage; read by the stats recorder.
    pub cache_hit: bool,
}

impl GatewayResponse {
    /// Creates a response with the given status and body and no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            cache_hit: false,
        }
    }

    /// A `200 OK` response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// A JSON response: sets `content-type: application/json`.
    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut resp = Self::new(status, body);
        resp.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        resp
    }

    /// A plain-text response: sets `content-type: text/plain`.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut resp = Self::new(status, body);
        resp.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        resp
    }

    /// Adds a header, panicking on invalid input; intended for tests.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name: HeaderName = name.parse().expect("invalid header name");
        let value: HeaderValue = value.parse().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accessors() {
        let req = GatewayRequest::get("/api/users?page=2").with_header("x-trace", "abc");
        assert_eq!(req.path(), "/api/users");
        assert_eq!(req.query(), Some("page=2"));
        assert_eq!(req.headers.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn request_clone_shares_body() {
        let req = GatewayRequest::get("/a").with_body("hello");
        let copy = req.clone();
        assert_eq!(req.body, copy.body);
        assert_eq!(copy.method, Method::GET);
    }

    #[test]
    fn json_response_sets_content_type() {
        let resp = GatewayResponse::json(StatusCode::TOO_MANY_REQUESTS, r#"{"error":"x"}"#);
        assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            resp.headers.get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(!resp.cache_hit);
    }
}
