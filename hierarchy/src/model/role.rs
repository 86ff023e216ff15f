use serde::{Deserialize, Serialize};

/// A predefined or custom role with its flat included-permissions list.
/// Expansion is non-transitive.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// `roles/…` for predefined roles, `organizations/…/roles/…` or
    /// `projects/…/roles/…` for custom roles.
    pub name: String,
    #[serde(default)]
    pub stage: String,
    /// Empty for predefined roles; the owning container URI for custom roles.
    #[serde(default)]
    pub parent_uri: String,
    #[serde(default)]
    pub included_permissions: Vec<String>,
}

impl Role {
    pub fn is_custom(&self) -> bool {
        !self.parent_uri.is_empty()
    }
}
