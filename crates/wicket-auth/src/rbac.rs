//! Role-based access control.
//!
//! Permissions are `action:resource` strings where either side may be the
//! `*` wildcard; a permission matches a required permission when its
//! wildcard expansion matches the whole string. Routes map regex patterns
//! to required permissions; lookup picks the most specific matching
//! pattern (fewest wildcards, then longest, then declaration order).

use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use crate::error::{AuthConfigError, AuthError};
use crate::user::UserRecord;

/// A validated `action:resource` permission.
#[derive(Debug, Clone)]
pub struct Permission {
    name: String,
    matcher: Option<Regex>,
}

impl Permission {
    /// Parses and validates a permission name.
    pub fn new(name: impl Into<String>) -> Result<Self, AuthConfigError> {
        let name = name.into();
        let valid = match name.split_once(':') {
            Some((action, resource)) => is_segment(action) && is_segment(resource),
            None => false,
        };
        if !valid {
            return Err(AuthConfigError::InvalidPermission(name));
        }

        let matcher = if name.contains('*') {
            let pattern = format!("^{}$", regex::escape(&name).replace(r"\*", ".*"));
            Some(Regex::new(&pattern).expect("wildcard expansion always compiles"))
        } else {
            None
        };

        Ok(Self { name, matcher })
    }

    /// The permission's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this permission satisfies `required`.
    pub fn matches(&self, required: &str) -> bool {
        match &self.matcher {
            Some(re) => re.is_match(required),
            None => self.name == required,
        }
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '*')
}

/// A named set of permissions.
#[derive(Debug, Clone)]
pub struct Role {
    name: String,
    description: Option<String>,
    permissions: Vec<Permission>,
}

impl Role {
    /// Creates an empty role, validating the name.
    pub fn new(name: impl Into<String>) -> Result<Self, AuthConfigError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(AuthConfigError::InvalidRoleName(name));
        }
        Ok(Self {
            name,
            description: None,
            permissions: Vec::new(),
        })
    }

    /// The role's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attaches a description.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The role's description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Adds a permission by name, skipping duplicates.
    pub fn grant(mut self, permission: &str) -> Result<Self, AuthConfigError> {
        if !self.permissions.iter().any(|p| p.name() == permission) {
            self.permissions.push(Permission::new(permission)?);
        }
        Ok(self)
    }

    /// Whether any of this role's permissions satisfies `required`.
    pub fn has_permission(&self, required: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(required))
    }

    /// The role's permissions.
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }
}

/// One route-to-required-permissions binding.
#[derive(Debug, Clone)]
struct RouteRule {
    pattern: String,
    regex: Regex,
    required: Vec<String>,
    /// Wildcard count and length, precomputed for specificity ordering.
    stars: usize,
}

/// The complete RBAC model: roles, user assignments and route rules.
#[derive(Debug, Clone, Default)]
pub struct RbacConfig {
    roles: HashMap<String, Role>,
    user_roles: HashMap<String, Vec<String>>,
    default_role: Option<String>,
    routes: Vec<RouteRule>,
    allow_any: bool,
}

impl RbacConfig {
    /// Creates an empty model granting access when any required permission
    /// is held.
    pub fn new() -> Self {
        Self {
            allow_any: true,
            ..Self::default()
        }
    }

    /// Sets whether holding ANY required permission suffices (`true`,
    /// default) or ALL are needed (`false`).
    pub fn allow_any_permission(mut self, allow_any: bool) -> Self {
        self.allow_any = allow_any;
        self
    }

    /// Registers a role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role.name().to_string(), role);
        self
    }

    /// Assigns a role to a user.
    pub fn assign(mut self, username: impl Into<String>, role: impl Into<String>) -> Self {
        self.user_roles
            .entry(username.into())
            .or_default()
            .push(role.into());
        self
    }

    /// Sets the role every authenticated user implicitly holds.
    pub fn default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    /// Requires `permissions` for paths matching `pattern` (a regex,
    /// anchored at the start of the path). Declaration order breaks
    /// specificity ties.
    pub fn require(
        mut self,
        pattern: impl Into<String>,
        permissions: Vec<String>,
    ) -> Result<Self, AuthConfigError> {
        let pattern = pattern.into();
        let anchored = if pattern.starts_with('^') {
            pattern.clone()
        } else {
            format!("^(?:{pattern})")
        };
        let regex = Regex::new(&anchored).map_err(|err| AuthConfigError::InvalidRoutePattern {
            pattern: pattern.clone(),
            reason: err.to_string(),
        })?;
        self.routes.push(RouteRule {
            stars: pattern.matches('*').count(),
            pattern,
            regex,
            required: permissions,
        });
        Ok(self)
    }

    /// Checks referential integrity: the default role and every assigned
    /// role must exist.
    pub fn validate(&self) -> Result<(), AuthConfigError> {
        if let Some(role) = &self.default_role {
            if !self.roles.contains_key(role) {
                return Err(AuthConfigError::UnknownRole(role.clone()));
            }
        }
        for roles in self.user_roles.values() {
            for role in roles {
                if !self.roles.contains_key(role) {
                    return Err(AuthConfigError::UnknownRole(role.clone()));
                }
            }
        }
        Ok(())
    }

    /// The roles a user holds, including the default role.
    pub fn user_roles(&self, username: &str) -> Vec<&Role> {
        let mut names: Vec<&str> = self
            .user_roles
            .get(username)
            .map(|roles| roles.iter().map(String::as_str).collect())
            .unwrap_or_default();
        if let Some(default) = &self.default_role {
            if !names.contains(&default.as_str()) {
                names.push(default);
            }
        }
        names
            .into_iter()
            .filter_map(|name| self.roles.get(name))
            .collect()
    }

    /// The union of a user's permission names, sorted.
    pub fn user_permissions(&self, username: &str) -> Vec<String> {
        let mut set = BTreeSet::new();
        for role in self.user_roles(username) {
            for permission in role.permissions() {
                set.insert(permission.name().to_string());
            }
        }
        set.into_iter().collect()
    }

    /// The required permissions for `path`: those of the most specific
    /// matching route rule, or empty when no rule matches.
    pub fn route_permissions(&self, path: &str) -> &[String] {
        let mut order: Vec<&RouteRule> = self.routes.iter().collect();
        // Stable sort keeps declaration order for equal keys.
        order.sort_by_key(|rule| (rule.stars, std::cmp::Reverse(rule.pattern.len())));

        for rule in order {
            if rule.regex.is_match(path) {
                return &rule.required;
            }
        }
        &[]
    }

    /// Authorizes `user` for `path`, failing with the full denial context.
    pub fn authorize(&self, user: &UserRecord, path: &str) -> Result<(), AuthError> {
        let required = self.route_permissions(path);
        if required.is_empty() {
            return Ok(());
        }

        let username = user.username().unwrap_or("<unknown>");
        let held: Vec<&Permission> = self
            .user_roles(username)
            .into_iter()
            .flat_map(|role| role.permissions().iter())
            .collect();

        let satisfied = |needed: &String| held.iter().any(|p| p.matches(needed));
        let allowed = if self.allow_any {
            required.iter().any(satisfied)
        } else {
            required.iter().all(satisfied)
        };

        if allowed {
            Ok(())
        } else {
            Err(AuthError::AccessDenied {
                user: username.to_string(),
                path: path.to_string(),
                required: required.to_vec(),
                granted: self.user_permissions(username),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RbacConfig {
        RbacConfig::new()
            .with_role(
                Role::new("admin")
                    .unwrap()
                    .describe("full access")
                    .grant("*:*")
                    .unwrap(),
            )
            .with_role(Role::new("user").unwrap().grant("read:api").unwrap())
            .assign("admin", "admin")
            .assign("alice", "user")
            .require("/api/admin/.*", vec!["admin:access".to_string()])
            .unwrap()
            .require("/api/.*", vec!["read:api".to_string()])
            .unwrap()
    }

    #[test]
    fn permission_wildcards_match() {
        let read_any = Permission::new("read:*").unwrap();
        assert!(read_any.matches("read:users"));
        assert!(!read_any.matches("write:users"));

        let all = Permission::new("*:*").unwrap();
        assert!(all.matches("admin:access"));
        assert!(all.matches("read:api"));

        let exact = Permission::new("read:api").unwrap();
        assert!(exact.matches("read:api"));
        assert!(!exact.matches("read:apix"));
    }

    #[test]
    fn bad_permission_shapes_are_rejected() {
        assert!(Permission::new("read").is_err());
        assert!(Permission::new("read:").is_err());
        assert!(Permission::new(":api").is_err());
        assert!(Permission::new("re ad:api").is_err());
        assert!(Permission::new("read:api:extra").is_err());
    }

    #[test]
    fn bad_role_names_are_rejected() {
        assert!(Role::new("ad min").is_err());
        assert!(Role::new("").is_err());
        assert!(Role::new("team-lead_2").is_ok());
    }

    #[test]
    fn admin_passes_user_denied() {
        let model = model();
        model.validate().unwrap();

        let admin = UserRecord::basic("admin");
        assert!(model.authorize(&admin, "/api/admin/x").is_ok());

        let alice = UserRecord::basic("alice");
        let err = model.authorize(&alice, "/api/admin/x").unwrap_err();
        match err {
            AuthError::AccessDenied {
                user,
                path,
                required,
                granted,
            } => {
                assert_eq!(user, "alice");
                assert_eq!(path, "/api/admin/x");
                assert_eq!(required, vec!["admin:access".to_string()]);
                assert_eq!(granted, vec!["read:api".to_string()]);
            }
            other => panic!("expected AccessDenied, got {other:?}"),
        }
    }

    #[test]
    fn unguarded_route_admits_anyone() {
        let model = model();
        let nobody = UserRecord::basic("ghost");
        assert!(model.authorize(&nobody, "/health").is_ok());
    }

    #[test]
    fn specificity_prefers_fewer_wildcards_then_length() {
        let model = RbacConfig::new()
            .require("/api/.*", vec!["read:api".to_string()])
            .unwrap()
            .require("/api/admin/.*", vec!["admin:access".to_string()])
            .unwrap();

        // Same wildcard count; the longer pattern wins.
        assert_eq!(model.route_permissions("/api/admin/x"), ["admin:access"]);
        assert_eq!(model.route_permissions("/api/users"), ["read:api"]);
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let model = RbacConfig::new()
            .require("/a/.*", vec!["first:rule".to_string()])
            .unwrap()
            .require("/b/.*", vec!["second:rule".to_string()])
            .unwrap();
        assert_eq!(model.route_permissions("/a/x"), ["first:rule"]);
        assert_eq!(model.route_permissions("/b/x"), ["second:rule"]);
    }

    #[test]
    fn allow_all_requires_every_permission() {
        let model = RbacConfig::new()
            .allow_any_permission(false)
            .with_role(
                Role::new("reader")
                    .unwrap()
                    .grant("read:api")
                    .unwrap()
                    .grant("list:api")
                    .unwrap(),
            )
            .with_role(Role::new("partial").unwrap().grant("read:api").unwrap())
            .assign("full", "reader")
            .assign("half", "partial")
            .require(
                "/api/.*",
                vec!["read:api".to_string(), "list:api".to_string()],
            )
            .unwrap();

        assert!(model
            .authorize(&UserRecord::basic("full"), "/api/x")
            .is_ok());
        assert!(model
            .authorize(&UserRecord::basic("half"), "/api/x")
            .is_err());
    }

    #[test]
    fn default_role_applies_to_everyone() {
        let model = RbacConfig::new()
            .with_role(Role::new("guest").unwrap().grant("read:public").unwrap())
            .default_role("guest")
            .require("/public/.*", vec!["read:public".to_string()])
            .unwrap();

        assert!(model
            .authorize(&UserRecord::basic("anyone"), "/public/x")
            .is_ok());
    }

    #[test]
    fn validate_catches_dangling_roles() {
        let model = RbacConfig::new().assign("alice", "ghost-role");
        assert!(matches!(
            model.validate(),
            Err(AuthConfigError::UnknownRole(_))
        ));
    }

    #[test]
    fn jwt_sub_claim_authorizes() {
        let model = model();
        let mut claims = serde_json::Map::new();
        claims.insert("sub".into(), serde_json::Value::String("admin".into()));
        let user = UserRecord::jwt(claims);
        assert!(model.authorize(&user, "/api/admin/x").is_ok());
    }
}
