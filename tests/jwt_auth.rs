//! JWT authentication and RBAC configured entirely through YAML.

use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use http::StatusCode;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tower::service_fn;
use wicket_core::{GatewayRequest, GatewayResponse};
use wicket_gateway::{Gateway, GatewayConfig, GatewayError};

const SECRET: &str = "gateway-test-secret";

const YAML: &str = r#"
wicket:
  paths:
    - pattern: "/api/*"
      features:
        auth:
          type: jwt
          secret: "gateway-test-secret"
          rbac:
            roles:
              admin: ["*:*"]
              user: ["read:api"]
            user_roles:
              admin-user: [admin]
              plain-user: [user]
            route_permissions:
              "/api/admin/.*": ["admin:access"]
              "/api/.*": ["read:api"]
"#;

type AppFuture = BoxFuture<'static, Result<GatewayResponse, GatewayError>>;

fn gateway() -> Gateway {
    let config = GatewayConfig::from_yaml_str(YAML, "wicket").unwrap();
    let app = service_fn(|_req: GatewayRequest| {
        let fut: AppFuture = Box::pin(async { Ok(GatewayResponse::ok("protected")) });
        fut
    });
    Gateway::builder(config).app(app).build().unwrap()
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn token(sub: &str, lifetime: i64) -> String {
    let exp = now() as i64 + lifetime;
    encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(path: &str, token: &str) -> GatewayRequest {
    GatewayRequest::get(path).with_header("authorization", &format!("Bearer {token}"))
}

#[tokio::test]
async fn valid_token_with_the_right_role_passes() {
    let gateway = gateway();

    let resp = gateway
        .handle(request("/api/admin/users", &token("admin-user", 3600)))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "protected");

    let resp = gateway
        .handle(request("/api/things", &token("plain-user", 3600)))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_role_is_forbidden_with_context() {
    let gateway = gateway();

    let resp = gateway
        .handle(request("/api/admin/users", &token("plain-user", 3600)))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    let body = String::from_utf8(resp.body.to_vec()).unwrap();
    assert!(body.contains("plain-user"));
    assert!(body.contains("/api/admin/users"));
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let gateway = gateway();

    let resp = gateway
        .handle(request("/api/things", &token("plain-user", -3600)))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    let body = String::from_utf8(resp.body.to_vec()).unwrap();
    assert!(body.contains("expired"));
}

#[tokio::test]
async fn missing_and_malformed_tokens_are_unauthorized() {
    let gateway = gateway();

    let resp = gateway.handle(GatewayRequest::get("/api/things")).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = gateway
        .handle(request("/api/things", "not-a-token"))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_subject_lacks_every_permission() {
    let gateway = gateway();

    let resp = gateway
        .handle(request("/api/things", &token("stranger", 3600)))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn paths_outside_the_pattern_skip_auth_entirely() {
    let gateway = gateway();

    // No auth header at all: the bypass path forwards to the app.
    let resp = gateway.handle(GatewayRequest::get("/public")).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let gateway = gateway();

    let forged = encode(
        &Header::default(),
        &json!({ "sub": "admin-user", "exp": now() + 3600 }),
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();
    let resp = gateway.handle(request("/api/admin/users", &forged)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
