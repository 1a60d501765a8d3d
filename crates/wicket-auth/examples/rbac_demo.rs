//! RBAC decisions against a small role model.
//!
//! Run with: cargo run -p wicket-auth --example rbac_demo

use wicket_auth::rbac::{RbacConfig, Role};
use wicket_auth::UserRecord;

fn main() -> Result<(), wicket_auth::AuthConfigError> {
    let model = RbacConfig::new()
        .with_role(Role::new("admin")?.describe("full access").grant("*:*")?)
        .with_role(Role::new("editor")?.grant("read:articles")?.grant("write:articles")?)
        .with_role(Role::new("viewer")?.grant("read:*")?)
        .assign("ada", "admin")
        .assign("eve", "editor")
        .assign("vic", "viewer")
        .require("/admin/.*", vec!["admin:panel".to_string()])?
        .require("/articles/edit/.*", vec!["write:articles".to_string()])?
        .require("/articles/.*", vec!["read:articles".to_string()])?;
    model.validate()?;

    for user in ["ada", "eve", "vic", "nobody"] {
        let record = UserRecord::basic(user);
        for path in ["/admin/settings", "/articles/edit/42", "/articles/42", "/public"] {
            let verdict = match model.authorize(&record, path) {
                Ok(()) => "allow",
                Err(_) => "deny",
            };
            println!("{user:>8} {path:<22} {verdict}");
        }
    }
    Ok(())
}
