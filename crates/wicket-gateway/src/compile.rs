//! Compiles the loaded configuration into per-path policy objects.
//!
//! Pattern rules: a leading `^` means "already a regex, use verbatim";
//! glob characters (`*`, `?`, `[`) map `*`→`.*` and `?`→`.` inside full
//! anchors; anything else is escaped for an exact match. Each compiled
//! feature owns its circuit breaker (state is per path) and carries the
//! precomputed throttle scope; the expensive pieces are built once here,
//! never per request.

use std::sync::Arc;

use regex::Regex;
use wicket_auth::{
    AuthLayer, Authenticator, BasicAuthenticator, JwtAuthenticator, JwtConfig, RbacConfig, Role,
};
use wicket_circuitbreaker::CircuitBreakerLayer;
use wicket_core::clock::Clock;

use crate::config::{
    AuthConfig, AuthKind, ConfigError, FeatureConfig, GatewayConfig, RbacSettings,
};
use crate::error::GatewayError;

/// One pattern → policy binding, in declaration order.
pub struct CompiledRoute {
    pub pattern: String,
    pub regex: Regex,
    pub feature: Arc<CompiledFeature>,
}

/// A path's compiled policy: scalars copied through, the rate-limiter
/// scope bound, the breaker and auth gate instantiated.
pub struct CompiledFeature {
    /// Identity for the composed-handler cache.
    pub id: u64,
    pub config: FeatureConfig,
    /// Scope fragment for throttle storage keys.
    pub throttle_scope: String,
    /// One breaker per compiled feature; its state is shared by every
    /// request to this path.
    pub breaker: Option<CircuitBreakerLayer<GatewayError>>,
    pub auth: Option<AuthLayer>,
}

/// Translates a path pattern into an anchored regex.
pub fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let source = if pattern.starts_with('^') {
        pattern.to_string()
    } else if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
        format!("^{}$", pattern.replace('*', ".*").replace('?', "."))
    } else {
        format!("^{}$", regex::escape(pattern))
    };
    Regex::new(&source)
        .map_err(|err| ConfigError::Invalid(format!("pattern '{pattern}': {err}")))
}

pub(crate) struct Compiler {
    clock: Arc<dyn Clock>,
    next_id: u64,
}

impl Compiler {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, next_id: 0 }
    }

    /// Compiles every configured path plus the default bundle.
    pub(crate) fn compile(
        &mut self,
        config: &GatewayConfig,
    ) -> Result<(Vec<CompiledRoute>, Option<Arc<CompiledFeature>>), ConfigError> {
        let mut routes = Vec::with_capacity(config.paths.len());
        for path in &config.paths {
            let regex = compile_pattern(&path.pattern)?;
            let feature = self.compile_feature(&path.features, &path.pattern)?;
            routes.push(CompiledRoute {
                pattern: path.pattern.clone(),
                regex,
                feature: Arc::new(feature),
            });
        }

        let default_feature = match &config.default_features {
            Some(features) => Some(Arc::new(self.compile_feature(features, "<default>")?)),
            None => None,
        };

        Ok((routes, default_feature))
    }

    fn compile_feature(
        &mut self,
        config: &FeatureConfig,
        scope: &str,
    ) -> Result<CompiledFeature, ConfigError> {
        let id = self.next_id;
        self.next_id += 1;

        let breaker = config.circuit_breaker.as_ref().map(|cb| {
            CircuitBreakerLayer::<GatewayError>::builder()
                .failure_threshold(cb.failure_threshold)
                .recovery_timeout(std::time::Duration::from_secs_f64(
                    cb.recovery_timeout.max(0.0),
                ))
                .failure_classifier(GatewayError::is_breaker_failure)
                .clock(Arc::clone(&self.clock))
                .name(scope)
                .feature_id(id)
                .build()
        });

        let auth = match &config.auth {
            Some(auth) => Some(compile_auth(auth)?),
            None => None,
        };

        Ok(CompiledFeature {
            id,
            config: config.clone(),
            throttle_scope: format!("path:{scope}"),
            breaker,
            auth,
        })
    }
}

fn compile_auth(config: &AuthConfig) -> Result<AuthLayer, ConfigError> {
    let authenticator = match config.kind {
        AuthKind::Basic => {
            let username = config
                .username
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("basic auth requires username".into()))?;
            let password = config
                .password
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid("basic auth requires password".into()))?;
            Authenticator::Basic(BasicAuthenticator::new(username, password))
        }
        AuthKind::Jwt => {
            let secret = config
                .secret
                .clone()
                .ok_or_else(|| ConfigError::Invalid("jwt auth requires secret".into()))?;
            let jwt_config = JwtConfig {
                secret,
                algorithm: config.algorithm.clone(),
                audience: config.audience.clone(),
                issuer: config.issuer.clone(),
                verify_signature: config.verify_signature,
                verify_exp: config.verify_exp,
                verify_nbf: config.verify_nbf,
                verify_iat: config.verify_iat,
                verify_aud: config.verify_aud,
                verify_iss: config.verify_iss,
            };
            Authenticator::Jwt(
                JwtAuthenticator::new(&jwt_config)
                    .map_err(|err| ConfigError::Invalid(err.to_string()))?,
            )
        }
    };

    let mut layer = AuthLayer::new(authenticator);
    if let Some(rbac) = &config.rbac {
        layer = layer.with_rbac(compile_rbac(rbac)?);
    }
    Ok(layer)
}

fn compile_rbac(settings: &RbacSettings) -> Result<RbacConfig, ConfigError> {
    let invalid = |err: wicket_auth::AuthConfigError| ConfigError::Invalid(err.to_string());

    let mut model = RbacConfig::new().allow_any_permission(settings.allow_any_permission);

    for (name, spec) in &settings.roles {
        let mut role = Role::new(name).map_err(invalid)?;
        if let Some(description) = spec.description() {
            role = role.describe(description);
        }
        for permission in spec.permissions() {
            role = role.grant(permission).map_err(invalid)?;
        }
        model = model.with_role(role);
    }

    for (username, roles) in &settings.user_roles {
        for role in roles {
            model = model.assign(username, role);
        }
    }

    if let Some(default_role) = &settings.default_role {
        model = model.default_role(default_role);
    }

    for (pattern, permissions) in &settings.route_permissions.0 {
        model = model
            .require(pattern, permissions.clone())
            .map_err(invalid)?;
    }

    model.validate().map_err(invalid)?;
    Ok(model)
}
