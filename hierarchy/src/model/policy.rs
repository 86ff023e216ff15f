use serde::{Deserialize, Serialize};

/// An IAM condition. The CEL expression is recorded verbatim and never
/// evaluated at this layer; tuples derived from conditional bindings carry
/// it in their provenance.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expression: String,
}

/// One role-to-members association inside an allow policy.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// The allow policy attached to one resource.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// URI of the resource this policy is attached to. Always equal to the
    /// owning resource's URI once the resource is registered.
    #[serde(default)]
    pub resource_uri: String,
}

/// One rule of a deny policy. Denied permissions are enumerated directly;
/// there is no role indirection on the deny side.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyRule {
    #[serde(default)]
    pub denied_principals: Vec<String>,
    #[serde(default)]
    pub denied_permissions: Vec<String>,
    #[serde(default)]
    pub exception_principals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// A deny policy. Only ever attached to org, folder, or project containers.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyPolicy {
    pub name: String,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub rules: Vec<DenyRule>,
}

/// All policies hosted by one resource: at most one allow policy and any
/// number of deny policies.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policies {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Policy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<DenyPolicy>,
}

impl Policies {
    pub fn is_empty(&self) -> bool {
        self.allow.is_none() && self.deny.is_empty()
    }
}
