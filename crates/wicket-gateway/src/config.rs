//! Gateway configuration and its YAML schema.
//!
//! The file carries one namespace (default `wicket`; dotted namespaces
//! like `tool.wicket` navigate nested mappings) holding the keyspace, an
//! ordered list of path policies, optional default features and optional
//! backend servers:
//!
//! ```yaml
//! wicket:
//!   keyspace: my-gateway
//!   servers:
//!     - http://backend-a:8000
//!   paths:
//!     - pattern: "/api/*"
//!       features:
//!         timeout:
//!           seconds: 5.0
//!         rate_limit:
//!           quota: 100
//!           duration: 60
//!           algorithm: token_bucket
//!   default_features:
//!     timeout:
//!       seconds: 10.0
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use wicket_throttle::ThrottleAlgo;

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("namespace '{0}' not found in configuration")]
    MissingNamespace(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level gateway configuration, immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Prefix for every storage key this gateway writes.
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Ordered path policies; first match wins.
    #[serde(default)]
    pub paths: Vec<PathConfig>,

    /// Features applied when no path pattern matches.
    #[serde(default)]
    pub default_features: Option<FeatureConfig>,

    /// Backend servers to forward to.
    #[serde(default)]
    pub servers: Option<Vec<String>>,
}

fn default_keyspace() -> String {
    "wicket-gateway".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            keyspace: default_keyspace(),
            paths: Vec::new(),
            default_features: None,
            servers: None,
        }
    }
}

impl GatewayConfig {
    /// Loads the configuration from a YAML file under `namespace`.
    pub async fn from_file(
        path: impl AsRef<Path>,
        namespace: &str,
    ) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&raw, namespace)
    }

    /// Parses the configuration from YAML text under `namespace`.
    pub fn from_yaml_str(raw: &str, namespace: &str) -> Result<Self, ConfigError> {
        let document: serde_yaml::Value = serde_yaml::from_str(raw)?;

        let mut scope = &document;
        for part in namespace.split('.') {
            scope = scope
                .get(part)
                .ok_or_else(|| ConfigError::MissingNamespace(namespace.to_string()))?;
        }

        let config: GatewayConfig = serde_yaml::from_value(scope.clone())?;
        config.validate()?;
        Ok(config)
    }

    /// Checks constraints the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in &self.paths {
            if path.pattern.is_empty() {
                return Err(ConfigError::Invalid("empty path pattern".to_string()));
            }
            path.features.validate()?;
        }
        if let Some(features) = &self.default_features {
            features.validate()?;
        }
        if let Some(servers) = &self.servers {
            if servers.is_empty() {
                return Err(ConfigError::Invalid(
                    "servers list must not be empty when present".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One path pattern and the features applied to it.
#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    /// Glob (`*`, `?`) or explicit regex (leading `^`).
    pub pattern: String,
    #[serde(default)]
    pub features: FeatureConfig,
}

/// The feature bundle for a path. All sub-configs are independent; any
/// combination is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub timeout: Option<TimeoutConfig>,
    #[serde(default)]
    pub monitoring: Option<MonitoringConfig>,
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl FeatureConfig {
    /// Names of the features present, for the dashboard policies view.
    pub fn feature_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.cache.is_some() {
            names.push("cache");
        }
        if self.rate_limit.is_some() {
            names.push("rate_limit");
        }
        if self.retry.is_some() {
            names.push("retry");
        }
        if self.timeout.is_some() {
            names.push("timeout");
        }
        if self.monitoring.is_some() {
            names.push("monitoring");
        }
        if self.circuit_breaker.is_some() {
            names.push("circuit_breaker");
        }
        if self.auth.is_some() {
            names.push("auth");
        }
        names
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rate_limit) = &self.rate_limit {
            if rate_limit.duration == 0 {
                return Err(ConfigError::Invalid(
                    "rate_limit.duration must be positive".to_string(),
                ));
            }
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        Ok(())
    }
}

/// Response caching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL in seconds; absent means no expiry.
    #[serde(default)]
    pub expire_s: Option<u64>,
    /// Fixed cache key; absent derives one from method and path.
    #[serde(default)]
    pub cache_key: Option<String>,
}

/// Rate limiting settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub quota: u64,
    /// Window length in seconds.
    pub duration: u64,
    #[serde(default = "default_algorithm")]
    pub algorithm: ThrottleAlgo,
    /// Leaky bucket capacity; defaults to the quota.
    #[serde(default)]
    pub bucket_size: Option<u64>,
    #[serde(default = "default_rate_limit_status")]
    pub error_status: u16,
    #[serde(default = "default_rate_limit_message")]
    pub error_message: String,
}

fn default_algorithm() -> ThrottleAlgo {
    ThrottleAlgo::FixedWindow
}

fn default_rate_limit_status() -> u16 {
    429
}

fn default_rate_limit_message() -> String {
    "Rate limit exceeded".to_string()
}

/// Retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_wait")]
    pub wait: WaitConfig,
}

fn default_max_attempts() -> usize {
    3
}

fn default_wait() -> WaitConfig {
    WaitConfig::Fixed(1.0)
}

/// The file shape of a wait strategy: a number or a list of numbers
/// (seconds).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WaitConfig {
    Fixed(f64),
    PerAttempt(Vec<f64>),
}

/// Timeout settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    pub seconds: f64,
    #[serde(default = "default_timeout_status")]
    pub error_status: u16,
    #[serde(default = "default_timeout_message")]
    pub error_message: String,
}

fn default_timeout_status() -> u16 {
    504
}

fn default_timeout_message() -> String {
    "Request timeout".to_string()
}

/// Slow-request logging settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Requests slower than this many seconds are logged.
    #[serde(default = "default_log_threshold")]
    pub log_threshold: f64,
}

fn default_log_threshold() -> f64 {
    0.1
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before probing.
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout: f64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> f64 {
    60.0
}

/// Authentication settings, optionally carrying an RBAC model.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub kind: AuthKind,

    // Basic credentials.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    // JWT verification.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default = "default_true")]
    pub verify_signature: bool,
    #[serde(default = "default_true")]
    pub verify_exp: bool,
    #[serde(default = "default_true")]
    pub verify_nbf: bool,
    #[serde(default = "default_true")]
    pub verify_iat: bool,
    #[serde(default = "default_true")]
    pub verify_aud: bool,
    #[serde(default = "default_true")]
    pub verify_iss: bool,

    #[serde(default)]
    pub rbac: Option<RbacSettings>,
}

impl AuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            AuthKind::Basic => {
                if self.username.is_none() || self.password.is_none() {
                    return Err(ConfigError::Invalid(
                        "basic auth requires username and password".to_string(),
                    ));
                }
            }
            AuthKind::Jwt => {
                if self.secret.is_none() {
                    return Err(ConfigError::Invalid(
                        "jwt auth requires secret".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// The supported credential schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Basic,
    Jwt,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_true() -> bool {
    true
}

/// The file shape of the RBAC model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RbacSettings {
    #[serde(default)]
    pub roles: HashMap<String, RoleSpec>,
    #[serde(default)]
    pub user_roles: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub default_role: Option<String>,
    /// Declaration order matters: it breaks specificity ties.
    #[serde(default)]
    pub route_permissions: RoutePermissionList,
    #[serde(default = "default_true")]
    pub allow_any_permission: bool,
}

/// A role is either a bare permission list or a full spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleSpec {
    Permissions(Vec<String>),
    Detailed {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        permissions: Vec<String>,
    },
}

impl RoleSpec {
    /// The permission names, whichever shape was used.
    pub fn permissions(&self) -> &[String] {
        match self {
            RoleSpec::Permissions(perms) => perms,
            RoleSpec::Detailed { permissions, .. } => permissions,
        }
    }

    /// The description, when the full shape was used.
    pub fn description(&self) -> Option<&str> {
        match self {
            RoleSpec::Permissions(_) => None,
            RoleSpec::Detailed { description, .. } => description.as_deref(),
        }
    }
}

/// Route-permission pairs in declaration order. YAML mappings lose order
/// through a `HashMap`, so this deserializes the mapping manually.
#[derive(Debug, Clone, Default)]
pub struct RoutePermissionList(pub Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for RoutePermissionList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor;

        impl<'de> Visitor<'de> for OrderedMapVisitor {
            type Value = RoutePermissionList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of route pattern to permission list")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((pattern, permissions)) =
                    access.next_entry::<String, Vec<String>>()?
                {
                    entries.push((pattern, permissions));
                }
                Ok(RoutePermissionList(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
wicket:
  keyspace: demo
  servers:
    - http://backend-a:8000
    - http://backend-b:8000
  paths:
    - pattern: "/api/*"
      features:
        timeout:
          seconds: 5.0
        rate_limit:
          quota: 100
          duration: 60
          algorithm: sliding_window
        retry:
          max_attempts: 3
          wait: [0.1, 0.2, 0.4]
    - pattern: "/health"
      features:
        monitoring:
          log_threshold: 0.1
  default_features:
    timeout:
      seconds: 10.0
"#;

    #[test]
    fn sample_round_trips_through_the_schema() {
        let config = GatewayConfig::from_yaml_str(SAMPLE, "wicket").unwrap();
        assert_eq!(config.keyspace, "demo");
        assert_eq!(config.servers.as_ref().unwrap().len(), 2);
        assert_eq!(config.paths.len(), 2);

        let api = &config.paths[0];
        assert_eq!(api.pattern, "/api/*");
        let rl = api.features.rate_limit.as_ref().unwrap();
        assert_eq!(rl.quota, 100);
        assert_eq!(rl.algorithm, ThrottleAlgo::SlidingWindow);
        assert_eq!(rl.error_status, 429);
        assert_eq!(rl.error_message, "Rate limit exceeded");

        let retry = api.features.retry.as_ref().unwrap();
        assert!(matches!(&retry.wait, WaitConfig::PerAttempt(waits) if waits.len() == 3));

        assert_eq!(
            api.features.feature_names(),
            vec!["rate_limit", "retry", "timeout"]
        );

        assert!(config.default_features.is_some());
    }

    #[test]
    fn nested_namespace_is_navigated() {
        let raw = r#"
tool:
  wicket:
    keyspace: nested
"#;
        let config = GatewayConfig::from_yaml_str(raw, "tool.wicket").unwrap();
        assert_eq!(config.keyspace, "nested");
    }

    #[test]
    fn missing_namespace_is_reported() {
        let err = GatewayConfig::from_yaml_str("other: {}", "wicket").unwrap_err();
        assert!(matches!(err, ConfigError::MissingNamespace(_)));
    }

    #[test]
    fn auth_requires_matching_credentials() {
        let raw = r#"
wicket:
  paths:
    - pattern: "/x"
      features:
        auth:
          type: basic
          username: admin
"#;
        let err = GatewayConfig::from_yaml_str(raw, "wicket").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let raw = r#"
wicket:
  paths:
    - pattern: "/x"
      features:
        auth:
          type: jwt
"#;
        assert!(GatewayConfig::from_yaml_str(raw, "wicket").is_err());
    }

    #[test]
    fn rbac_route_permissions_preserve_declaration_order() {
        let raw = r#"
wicket:
  paths:
    - pattern: "/x"
      features:
        auth:
          type: basic
          username: admin
          password: secret
          rbac:
            roles:
              admin: ["*:*"]
              user:
                description: limited
                permissions: ["read:api"]
            user_roles:
              admin: [admin]
            route_permissions:
              "/api/b/.*": ["b:perm"]
              "/api/a/.*": ["a:perm"]
"#;
        let config = GatewayConfig::from_yaml_str(raw, "wicket").unwrap();
        let auth = config.paths[0].features.auth.as_ref().unwrap();
        let rbac = auth.rbac.as_ref().unwrap();
        assert_eq!(rbac.route_permissions.0[0].0, "/api/b/.*");
        assert_eq!(rbac.route_permissions.0[1].0, "/api/a/.*");
        assert_eq!(rbac.roles.get("admin").unwrap().permissions(), ["*:*"]);
        assert_eq!(
            rbac.roles.get("user").unwrap().description(),
            Some("limited")
        );
    }

    #[test]
    fn zero_duration_rate_limit_is_invalid() {
        let raw = r#"
wicket:
  paths:
    - pattern: "/x"
      features:
        rate_limit:
          quota: 5
          duration: 0
"#;
        assert!(matches!(
            GatewayConfig::from_yaml_str(raw, "wicket").unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }
}
