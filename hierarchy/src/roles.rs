//! Role name → permission set expansion.

use std::collections::HashMap;

use crate::model::Role;
use crate::Error;

/// Dictionary of every registered role, predefined and custom. Seeded once
/// from role collection (or the offline `roles.json`) before any binding is
/// resolved.
#[derive(Default)]
pub struct RoleExpander {
    roles: HashMap<String, Role>,
}

impl RoleExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, role: Role) {
        self.roles.insert(role.name.clone(), role);
    }

    pub fn register_all(&mut self, roles: impl IntoIterator<Item = Role>) {
        for role in roles {
            self.register(role);
        }
    }

    /// Expands a role to its flat included-permissions list. Fails on
    /// unregistered roles; callers degrade that to a warning and skip the
    /// binding.
    pub fn expand(&self, name: &str) -> Result<&[String], Error> {
        self.roles
            .get(name)
            .map(|role| role.included_permissions.as_slice())
            .ok_or_else(|| Error::UnknownRole(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn role(name: &str, permissions: &[&str]) -> Role {
        Role {
            name: name.to_string(),
            included_permissions: permissions.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn expands_registered_role() {
        let mut expander = RoleExpander::new();
        expander.register(role("roles/iam.serviceAccountUser", &["iam.serviceAccounts.actAs"]));
        assert_eq!(
            expander.expand("roles/iam.serviceAccountUser").unwrap(),
            &["iam.serviceAccounts.actAs".to_string()]
        );
    }

    #[test]
    fn unknown_role_is_an_error() {
        let expander = RoleExpander::new();
        assert!(matches!(
            expander.expand("roles/owner"),
            Err(Error::UnknownRole(name)) if name == "roles/owner"
        ));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut expander = RoleExpander::new();
        expander.register(role("projects/p/roles/x", &["a.b.c"]));
        expander.register(role("projects/p/roles/x", &["a.b.c", "d.e.f"]));
        assert_eq!(expander.expand("projects/p/roles/x").unwrap().len(), 2);
        assert_eq!(expander.len(), 1);
    }
}
