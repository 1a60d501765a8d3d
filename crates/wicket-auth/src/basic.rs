//! HTTP Basic authentication.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http::HeaderMap;

use crate::error::AuthError;
use crate::user::UserRecord;

/// Validates `Authorization: Basic …` against one configured credential
/// pair.
#[derive(Debug, Clone)]
pub struct BasicAuthenticator {
    username: String,
    password: String,
}

impl BasicAuthenticator {
    /// Creates an authenticator accepting exactly `username`/`password`.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Authenticates the request headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<UserRecord, AuthError> {
        let header = headers
            .get(http::header::AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?;
        let header = header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader("non-ascii header".to_string()))?;

        let encoded = header
            .strip_prefix("Basic ")
            .ok_or_else(|| AuthError::InvalidAuthHeader("expected Basic scheme".to_string()))?;

        let decoded = BASE64
            .decode(encoded)
            .map_err(|_| AuthError::InvalidAuthHeader("invalid base64 encoding".to_string()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::InvalidAuthHeader("invalid utf-8 credentials".to_string()))?;

        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::InvalidAuthHeader("invalid credentials format".to_string()))?;

        if username.as_bytes() != self.username.as_bytes()
            || password.as_bytes() != self.password.as_bytes()
        {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(UserRecord::basic(username))
    }
}
