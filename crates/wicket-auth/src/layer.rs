//! Tower layer chaining authentication and authorization.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::HeaderMap;
use tower::{Layer, Service};
#[cfg(feature = "tracing")]
use tracing::debug;
use wicket_core::GatewayRequest;

use crate::error::{AuthError, AuthGateError};
use crate::rbac::RbacConfig;
use crate::user::UserRecord;
use crate::{BasicAuthenticator, JwtAuthenticator};

/// The credential validator a gate runs.
pub enum Authenticator {
    /// HTTP Basic against one configured credential pair.
    Basic(BasicAuthenticator),
    /// Bearer JWT against the configured verification settings.
    Jwt(JwtAuthenticator),
}

impl Authenticator {
    /// Validates the request headers into a user record.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<UserRecord, AuthError> {
        match self {
            Authenticator::Basic(basic) => basic.authenticate(headers),
            Authenticator::Jwt(jwt) => jwt.authenticate(headers),
        }
    }
}

/// A Tower [`Layer`] rejecting requests that fail authentication or,
/// when an RBAC model is attached, authorization.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
    rbac: Option<Arc<RbacConfig>>,
}

impl AuthLayer {
    /// Creates a layer that only authenticates.
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            rbac: None,
        }
    }

    /// Chains RBAC authorization after authentication.
    pub fn with_rbac(mut self, rbac: RbacConfig) -> Self {
        self.rbac = Some(Arc::new(rbac));
        self
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthGate<S>;

    fn layer(&self, service: S) -> Self::Service {
        AuthGate {
            inner: service,
            authenticator: Arc::clone(&self.authenticator),
            rbac: self.rbac.clone(),
        }
    }
}

/// A Tower service admitting only authenticated (and authorized) requests.
pub struct AuthGate<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
    rbac: Option<Arc<RbacConfig>>,
}

impl<S: Clone> Clone for AuthGate<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            authenticator: Arc::clone(&self.authenticator),
            rbac: self.rbac.clone(),
        }
    }
}

impl<S> Service<GatewayRequest> for AuthGate<S>
where
    S: Service<GatewayRequest> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = S::Response;
    type Error = AuthGateError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(AuthGateError::Inner)
    }

    fn call(&mut self, req: GatewayRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let authenticator = Arc::clone(&self.authenticator);
        let rbac = self.rbac.clone();

        Box::pin(async move {
            let user = match authenticator.authenticate(&req.headers) {
                Ok(user) => user,
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    debug!(path = req.path(), error = %err, "authentication rejected");
                    return Err(AuthGateError::Rejected(err));
                }
            };

            if let Some(rbac) = &rbac {
                if let Err(err) = rbac.authorize(&user, req.path()) {
                    #[cfg(feature = "tracing")]
                    debug!(path = req.path(), error = %err, "authorization denied");
                    return Err(AuthGateError::Rejected(err));
                }
            }

            inner.call(req).await.map_err(AuthGateError::Inner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use tower::{service_fn, ServiceExt};
    use wicket_core::GatewayResponse;

    fn ok_service() -> tower::util::BoxCloneService<GatewayRequest, GatewayResponse, &'static str>
    {
        tower::util::BoxCloneService::new(service_fn(|_req: GatewayRequest| async {
            Ok::<_, &'static str>(GatewayResponse::ok("inner"))
        }))
    }

    fn basic_header(user: &str, pass: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{pass}")))
    }

    fn rbac() -> RbacConfig {
        RbacConfig::new()
            .with_role(Role::new("admin").unwrap().grant("*:*").unwrap())
            .with_role(Role::new("user").unwrap().grant("read:api").unwrap())
            .assign("admin", "admin")
            .assign("alice", "user")
            .require("/api/admin/.*", vec!["admin:access".to_string()])
            .unwrap()
    }

    #[tokio::test]
    async fn authenticated_request_reaches_inner() {
        let layer = AuthLayer::new(Authenticator::Basic(BasicAuthenticator::new(
            "admin",
            "adminpass",
        )));
        let svc = layer.layer(ok_service());

        let req =
            GatewayRequest::get("/x").with_header("authorization", &basic_header("admin", "adminpass"));
        let resp = svc.oneshot(req).await.unwrap();
        assert_eq!(resp.body, "inner");
    }

    #[tokio::test]
    async fn missing_credentials_reject() {
        let layer = AuthLayer::new(Authenticator::Basic(BasicAuthenticator::new(
            "admin",
            "adminpass",
        )));
        let svc = layer.layer(ok_service());

        let err = svc.oneshot(GatewayRequest::get("/x")).await.unwrap_err();
        assert!(matches!(
            err,
            AuthGateError::Rejected(AuthError::MissingAuthHeader)
        ));
    }

    #[tokio::test]
    async fn rbac_admits_admin_denies_user() {
        let layer = AuthLayer::new(Authenticator::Basic(BasicAuthenticator::new(
            "admin",
            "adminpass",
        )))
        .with_rbac(rbac());
        let svc = layer.layer(ok_service());

        let req = GatewayRequest::get("/api/admin/x")
            .with_header("authorization", &basic_header("admin", "adminpass"));
        assert!(svc.clone().oneshot(req).await.is_ok());

        // Basic auth holds one pair per gate; alice gets her own gate
        // against the same model.
        let layer = AuthLayer::new(Authenticator::Basic(BasicAuthenticator::new(
            "alice",
            "alicepass",
        )))
        .with_rbac(rbac());
        let svc = layer.layer(ok_service());
        let req = GatewayRequest::get("/api/admin/x")
            .with_header("authorization", &basic_header("alice", "alicepass"));
        let err = svc.oneshot(req).await.unwrap_err();
        match err {
            AuthGateError::Rejected(AuthError::AccessDenied { user, path, .. }) => {
                assert_eq!(user, "alice");
                assert_eq!(path, "/api/admin/x");
            }
            other => panic!("expected AccessDenied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inner_errors_pass_through() {
        let layer = AuthLayer::new(Authenticator::Basic(BasicAuthenticator::new(
            "admin",
            "adminpass",
        )));
        let svc = layer.layer(tower::util::BoxCloneService::new(service_fn(
            |_req: GatewayRequest| async { Err::<GatewayResponse, _>("boom") },
        )));

        let req =
            GatewayRequest::get("/x").with_header("authorization", &basic_header("admin", "adminpass"));
        let err = svc.oneshot(req).await.unwrap_err();
        assert_eq!(err.into_inner(), Some("boom"));
    }
}
