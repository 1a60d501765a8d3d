//! Bearer-JWT authentication.

use http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::error::{AuthConfigError, AuthError, TokenErrorKind};
use crate::user::UserRecord;

/// JWT verification settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret the token must verify against.
    pub secret: String,
    /// `HS256` (default), `HS384` or `HS512`.
    pub algorithm: String,
    /// Expected `aud` claim, when audience checking is on.
    pub audience: Option<String>,
    /// Expected `iss` claim, when issuer checking is on.
    pub issuer: Option<String>,
    pub verify_signature: bool,
    pub verify_exp: bool,
    pub verify_nbf: bool,
    pub verify_iat: bool,
    pub verify_aud: bool,
    pub verify_iss: bool,
}

impl JwtConfig {
    /// Settings verifying everything with algorithm `HS256`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: "HS256".to_string(),
            audience: None,
            issuer: None,
            verify_signature: true,
            verify_exp: true,
            verify_nbf: true,
            verify_iat: true,
            verify_aud: true,
            verify_iss: true,
        }
    }
}

/// Validates `Authorization: Bearer …` tokens.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
    verify_iat: bool,
}

impl JwtAuthenticator {
    /// Builds an authenticator from `config`.
    pub fn new(config: &JwtConfig) -> Result<Self, AuthConfigError> {
        let algorithm = match config.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(AuthConfigError::UnsupportedAlgorithm(other.to_string())),
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        validation.validate_exp = config.verify_exp;
        validation.validate_nbf = config.verify_nbf;
        validation.validate_aud = config.verify_aud;
        if config.verify_aud {
            if let Some(aud) = &config.audience {
                validation.set_audience(&[aud]);
            }
        }
        if config.verify_iss {
            if let Some(iss) = &config.issuer {
                validation.set_issuer(&[iss]);
            }
        }
        if !config.verify_signature {
            validation.insecure_disable_signature_validation();
        }

        Ok(Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            verify_iat: config.verify_iat,
        })
    }

    /// Authenticates the request headers, returning the claim set.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<UserRecord, AuthError> {
        let header = headers
            .get(http::header::AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?;
        let header = header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader("non-ascii header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::InvalidAuthHeader("expected Bearer scheme".to_string()))?;

        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|err| AuthError::InvalidToken(classify(err.kind())))?;

        // jsonwebtoken has no iat check of its own; reject a non-numeric
        // claim when the flag asks for it (a numeric one is already proof
        // enough that the token parsed).
        if self.verify_iat {
            if let Some(iat) = data.claims.get("iat") {
                if !iat.is_number() {
                    return Err(AuthError::InvalidToken(TokenErrorKind::Malformed));
                }
            }
        }

        Ok(UserRecord::jwt(data.claims))
    }
}

fn classify(kind: &ErrorKind) -> TokenErrorKind {
    match kind {
        ErrorKind::ExpiredSignature => TokenErrorKind::Expired,
        ErrorKind::InvalidSignature => TokenErrorKind::BadSignature,
        ErrorKind::InvalidAudience => TokenErrorKind::BadAudience,
        ErrorKind::InvalidIssuer => TokenErrorKind::BadIssuer,
        _ => TokenErrorKind::Malformed,
    }
}
