use serde::{Deserialize, Serialize};

use super::policy::Condition;

/// One rule of a principal-access-boundary policy. A rule resource with a
/// `.` is a fully qualified permission; one without is a service name.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PabRule {
    #[serde(default)]
    pub resources: Vec<String>,
}

/// A principal-access-boundary policy: a per-principal-set upper bound on
/// the permissions any allow policy can grant.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PabPolicy {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub rules: Vec<PabRule>,
}

/// Binds a PAB policy to a principal set at some container.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PabBinding {
    /// Name of the bound [`PabPolicy`].
    pub policy: String,
    pub principal_set: String,
    /// URI of the container hosting the binding.
    #[serde(default)]
    pub parent_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// Everything the PAB collector produced, persisted as `pab.json`.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PabState {
    #[serde(default)]
    pub policies: Vec<PabPolicy>,
    #[serde(default)]
    pub bindings: Vec<PabBinding>,
}
