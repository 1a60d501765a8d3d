use thiserror::Error;

/// Why a JWT was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    /// The `exp` claim is in the past.
    Expired,
    /// The signature did not verify against the configured secret.
    BadSignature,
    /// The `aud` claim did not match the configured audience.
    BadAudience,
    /// The `iss` claim did not match the configured issuer.
    BadIssuer,
    /// The token could not be parsed or failed another check.
    Malformed,
}

impl TokenErrorKind {
    /// Short human-readable reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenErrorKind::Expired => "token expired",
            TokenErrorKind::BadSignature => "invalid signature",
            TokenErrorKind::BadAudience => "invalid audience",
            TokenErrorKind::BadIssuer => "invalid issuer",
            TokenErrorKind::Malformed => "malformed token",
        }
    }
}

/// Authentication and authorization failures.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No `Authorization` header on the request.
    #[error("authorization header is required")]
    MissingAuthHeader,

    /// The `Authorization` header is not in the expected shape.
    #[error("invalid authorization header: {0}")]
    InvalidAuthHeader(String),

    /// Username or password did not match.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The bearer token was rejected.
    #[error("invalid token: {}", .0.as_str())]
    InvalidToken(TokenErrorKind),

    /// The authenticated user lacks the permissions the route requires.
    #[error(
        "Access denied for user '{user}' to path '{path}'. \
         Required permissions: {required:?}, User permissions: {granted:?}"
    )]
    AccessDenied {
        user: String,
        path: String,
        required: Vec<String>,
        granted: Vec<String>,
    },
}

impl AuthError {
    /// Returns true for RBAC denials (403 territory, not 401).
    pub fn is_access_denied(&self) -> bool {
        matches!(self, AuthError::AccessDenied { .. })
    }
}

/// Invalid authentication or RBAC configuration, reported at build time.
#[derive(Debug, Clone, Error)]
pub enum AuthConfigError {
    /// Only HMAC algorithms are supported for JWT verification.
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A permission is not of the form `action:resource`.
    #[error(
        "invalid permission format: {0} (expected 'action:resource', e.g. 'read:api', '*:*')"
    )]
    InvalidPermission(String),

    /// A role name contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid role name: {0}")]
    InvalidRoleName(String),

    /// A referenced role was never defined.
    #[error("role '{0}' not found")]
    UnknownRole(String),

    /// A route pattern failed to compile as a regex.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidRoutePattern { pattern: String, reason: String },
}

/// Errors returned by the [`crate::AuthGate`] service.
#[derive(Debug, Error)]
pub enum AuthGateError<E> {
    /// The request was rejected before reaching the inner service.
    #[error(transparent)]
    Rejected(AuthError),

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> AuthGateError<E> {
    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            AuthGateError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for AuthGateError<E> {
    fn from(err: E) -> Self {
        AuthGateError::Inner(err)
    }
}
