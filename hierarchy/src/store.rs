//! Offline persistence: collected state as pretty JSON artifacts in a data
//! directory, reloadable for network-free analysis.

use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::model::{Hierarchy, PabState, Resource, Role};
use crate::Error;

pub const METADATA_FILE: &str = "metadata.json";
pub const HIERARCHY_FILE: &str = "hierarchy.json";
pub const ROLES_FILE: &str = "roles.json";
pub const PAB_FILE: &str = "pab.json";
pub const RESOURCES_FILE: &str = "resources.json";

/// Collection metadata persisted alongside the artifacts.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: String,
    pub org_id: String,
    pub collected_pabs: bool,
    pub collected_deny_policies: bool,
    pub asset_types: Vec<String>,
}

impl Metadata {
    pub fn new(
        org_id: impl Into<String>,
        collected_pabs: bool,
        collected_deny_policies: bool,
        asset_types: Vec<String>,
    ) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            org_id: org_id.into(),
            collected_pabs,
            collected_deny_policies,
            asset_types,
        }
    }
}

/// Everything a collection run produced. The analyze pipelines are a pure
/// function of this state.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct CollectedState {
    pub metadata: Metadata,
    pub hierarchy: Hierarchy,
    pub roles: Vec<Role>,
    pub pab: PabState,
    pub resources: Vec<Resource>,
}

pub struct OfflineStore {
    dir: PathBuf,
}

impl OfflineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(&self, state: &CollectedState) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        self.write(METADATA_FILE, &state.metadata)?;
        self.write(HIERARCHY_FILE, &state.hierarchy)?;
        self.write(ROLES_FILE, &state.roles)?;
        self.write(PAB_FILE, &state.pab)?;
        self.write(RESOURCES_FILE, &state.resources)?;
        tracing::info!(dir = %self.dir.display(), "persisted collected state");
        Ok(())
    }

    pub fn load(&self) -> Result<CollectedState, Error> {
        Ok(CollectedState {
            metadata: self.read(METADATA_FILE)?,
            hierarchy: self.read(HIERARCHY_FILE)?,
            roles: self.read(ROLES_FILE)?,
            pab: self.read(PAB_FILE)?,
            resources: self.read(RESOURCES_FILE)?,
        })
    }

    fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<(), Error> {
        let path = self.dir.join(file);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "wrote offline artifact");
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T, Error> {
        let path = self.dir.join(file);
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{asset, Binding, Organization, PabPolicy, PabRule, Policies, Policy, Project};

    fn sample_state() -> CollectedState {
        CollectedState {
            metadata: Metadata::new("111", true, true, vec![asset::BUCKET.to_string()]),
            hierarchy: Hierarchy {
                organizations: vec![Organization {
                    name: "organizations/111".to_string(),
                    display_name: "example.com".to_string(),
                    policies: Policies {
                        allow: Some(Policy {
                            version: 3,
                            etag: "abc".to_string(),
                            bindings: vec![Binding {
                                role: "roles/storage.admin".to_string(),
                                members: vec!["user:alice@example.com".to_string()],
                                condition: None,
                            }],
                            resource_uri: "//cloudresourcemanager.googleapis.com/organizations/111"
                                .to_string(),
                        }),
                        deny: vec![],
                    },
                    folders: vec![],
                    projects: vec![Project {
                        name: "projects/222".to_string(),
                        project_id: "p-alpha".to_string(),
                        parent: "organizations/111".to_string(),
                        display_name: "alpha".to_string(),
                        policies: Policies::default(),
                    }],
                }],
            },
            roles: vec![Role {
                name: "roles/storage.admin".to_string(),
                stage: "GA".to_string(),
                parent_uri: String::new(),
                included_permissions: vec!["storage.objects.create".to_string()],
            }],
            pab: PabState {
                policies: vec![PabPolicy {
                    name: "organizations/111/locations/global/principalAccessBoundaryPolicies/p"
                        .to_string(),
                    display_name: String::new(),
                    rules: vec![PabRule {
                        resources: vec!["storage".to_string()],
                    }],
                }],
                bindings: vec![],
            },
            resources: vec![Resource::new(asset::BUCKET, "//storage.googleapis.com/projects/222/buckets/b1")],
        }
    }

    #[test]
    fn round_trips_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = OfflineStore::new(dir.path());
        let state = sample_state();
        store.save(&state).unwrap();

        for file in [METADATA_FILE, HIERARCHY_FILE, ROLES_FILE, PAB_FILE, RESOURCES_FILE] {
            assert!(dir.path().join(file).exists(), "{file}");
        }

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn metadata_keys_are_snake_case() {
        let json = serde_json::to_string(&Metadata::new("111", false, true, vec![])).unwrap();
        assert!(json.contains("\"org_id\""));
        assert!(json.contains("\"collected_deny_policies\""));
    }

    #[test]
    fn load_fails_on_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        assert!(OfflineStore::new(dir.path()).load().is_err());
    }
}
