use serde::{Deserialize, Serialize};

use super::policy::Policies;

/// The collected container tree, persisted as `hierarchy.json`. Ownership
/// points downward only; upward links are URI strings.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// `organizations/{number}`.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Policies::is_empty")]
    pub policies: Policies,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// `folders/{number}`.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Parent container name (`organizations/…` or `folders/…`).
    #[serde(default)]
    pub parent: String,
    #[serde(default, skip_serializing_if = "Policies::is_empty")]
    pub policies: Policies,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// `projects/{number}`.
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Policies::is_empty")]
    pub policies: Policies,
}

impl Project {
    /// The project number from the `projects/{number}` name.
    pub fn number(&self) -> &str {
        self.name.strip_prefix("projects/").unwrap_or(&self.name)
    }
}
