use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::policy::Policies;

/// CAI asset types produced by this engine.
pub mod asset {
    pub const ORGANIZATION: &str = "cloudresourcemanager.googleapis.com/Organization";
    pub const FOLDER: &str = "cloudresourcemanager.googleapis.com/Folder";
    pub const PROJECT: &str = "cloudresourcemanager.googleapis.com/Project";
    pub const SERVICE_ACCOUNT: &str = "iam.googleapis.com/ServiceAccount";
    pub const INSTANCE: &str = "compute.googleapis.com/Instance";
    pub const FUNCTION: &str = "cloudfunctions.googleapis.com/CloudFunction";
    pub const RUN_SERVICE: &str = "run.googleapis.com/Service";
    pub const BUCKET: &str = "storage.googleapis.com/Bucket";
    pub const SECRET: &str = "secretmanager.googleapis.com/Secret";
    pub const DEPLOYMENT: &str = "deploymentmanager.googleapis.com/Deployment";

    // Principal leaves synthesized during resolution.
    pub const USER: &str = "iam.googleapis.com/User";
    pub const GROUP: &str = "iam.googleapis.com/Group";
    pub const DOMAIN: &str = "iam.googleapis.com/Domain";
    pub const ALL_USERS: &str = "iam.googleapis.com/AllUsers";
    pub const ALL_AUTHENTICATED_USERS: &str = "iam.googleapis.com/AllAuthenticatedUsers";
    pub const WORKLOAD_IDENTITY: &str = "iam.googleapis.com/WorkloadIdentity";
    pub const WORKFORCE_IDENTITY: &str = "iam.googleapis.com/WorkforceIdentity";
    pub const PRINCIPAL_SET: &str = "iam.googleapis.com/PrincipalSet";
    pub const UNKNOWN: &str = "iam.googleapis.com/Unknown";
}

/// Well-known property keys.
pub mod prop {
    pub const ID: &str = "id";
    pub const EMAIL: &str = "email";
    pub const PROJECT_ID: &str = "projectId";
    pub const PROJECT_NUMBER: &str = "projectNumber";
    pub const ZONE: &str = "zone";
    pub const SERVICE_ACCOUNT: &str = "serviceAccount";
    pub const GOOGLE_MANAGED: &str = "googleManaged";
    pub const DELETED: &str = "deleted";
    pub const LABEL_PREFIX: &str = "label:";
}

/// The universal node: every entity the processor registers, from
/// organizations down to single service accounts and synthesized principal
/// leaves. Immutable once registered.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub asset_type: String,
    pub uri: String,
    #[serde(default)]
    pub parent_uri: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Policies::is_empty")]
    pub policies: Policies,
}

impl Resource {
    pub fn new(asset_type: impl Into<String>, uri: impl Into<String>) -> Self {
        Resource {
            asset_type: asset_type.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn set_label(&mut self, key: &str, value: impl Into<String>) {
        self.properties.insert(format!("{}{key}", prop::LABEL_PREFIX), value.into());
    }
}
