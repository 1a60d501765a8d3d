//! The authenticated-user record.

use serde_json::{Map, Value};

/// A flat record describing the authenticated caller.
///
/// Basic auth produces a record with a single `username` claim; JWT auth
/// carries the full claim set. Authorization reads a small set of fields
/// with documented precedence rather than interpreting the whole map.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// `"basic"` or `"jwt"`.
    pub auth_type: &'static str,
    /// Free-form claims.
    pub claims: Map<String, Value>,
}

impl UserRecord {
    /// Builds a record for a Basic-authenticated user.
    pub fn basic(username: &str) -> Self {
        let mut claims = Map::new();
        claims.insert("username".to_string(), Value::String(username.to_string()));
        Self {
            auth_type: "basic",
            claims,
        }
    }

    /// Builds a record from a JWT claim set.
    pub fn jwt(claims: Map<String, Value>) -> Self {
        Self {
            auth_type: "jwt",
            claims,
        }
    }

    /// The caller's username: first of `username`, `sub`, `user_id`.
    pub fn username(&self) -> Option<&str> {
        for field in ["username", "sub", "user_id"] {
            if let Some(Value::String(name)) = self.claims.get(field) {
                return Some(name);
            }
        }
        None
    }
}
