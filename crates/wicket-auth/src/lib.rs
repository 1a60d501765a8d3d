//! Authentication and role-based authorization for the wicket gateway.
//!
//! Two credential validators share one contract (headers in, a
//! [`UserRecord`] out): HTTP Basic ([`BasicAuthenticator`]) and Bearer JWT
//! ([`JwtAuthenticator`]). The [`RbacConfig`] model maps roles to
//! `action:resource` permissions and routes to required permissions;
//! [`AuthLayer`] chains the two in front of a Tower service.
//!
//! ## Basic Example
//!
//! ```rust
//! use wicket_auth::rbac::{RbacConfig, Role};
//! use wicket_auth::{AuthLayer, Authenticator, BasicAuthenticator};
//!
//! # fn example() -> Result<(), wicket_auth::AuthConfigError> {
//! let rbac = RbacConfig::new()
//!     .with_role(Role::new("admin")?.grant("*:*")?)
//!     .assign("admin", "admin")
//!     .require("/api/admin/.*", vec!["admin:access".to_string()])?;
//!
//! let layer = AuthLayer::new(Authenticator::Basic(BasicAuthenticator::new(
//!     "admin", "adminpass",
//! )))
//! .with_rbac(rbac);
//! # let _ = layer;
//! # Ok(())
//! # }
//! ```

mod basic;
mod error;
mod jwt;
mod layer;
pub mod rbac;
mod user;

pub use basic::BasicAuthenticator;
pub use error::{AuthConfigError, AuthError, AuthGateError, TokenErrorKind};
pub use jwt::{JwtAuthenticator, JwtConfig};
pub use layer::{AuthGate, AuthLayer, Authenticator};
pub use rbac::{Permission, RbacConfig, Role};
pub use user::UserRecord;
