//! Principal resolution and tuple emission: the final pass consuming the
//! pending-binding buffer.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::member::{BasicRole, EmailPrincipal, Principal, WorkloadIdentity};
use crate::model::{asset, prop, Resource};
use crate::output::{PermissionTuple, Provenance};
use crate::privesc;
use crate::uri;

use super::{HierarchyProcessor, PendingBinding};

const CRM_PRINCIPAL_SET_PREFIX: &str = "principalSet://cloudresourcemanager.googleapis.com/";

impl HierarchyProcessor {
    /// Resolves every pending binding into tuples. Bindings with an
    /// unregistered role or target, or an unknown member kind, are skipped
    /// with a warning; their siblings proceed independently.
    pub(crate) fn emit(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        tracing::debug!(count = pending.len(), "resolving pending bindings");
        for binding in &pending {
            self.emit_binding(binding);
        }
    }

    fn emit_binding(&mut self, binding: &PendingBinding) {
        let principal = self.normalizer.normalize(&binding.member);

        // Deny bindings carry the denied permission literal in `role`.
        let permissions: BTreeSet<String> = if binding.is_deny {
            BTreeSet::from([binding.role.clone()])
        } else {
            let expanded: BTreeSet<String> = match self.expander.expand(&binding.role) {
                Ok(permissions) => permissions.iter().cloned().collect(),
                Err(_) => {
                    tracing::warn!(role = %binding.role, "skipping binding with unregistered role");
                    return;
                }
            };
            self.pab.filter(&principal.key(), expanded)
        };

        let Some(target) = self.registry.get(&binding.target_uri) else {
            tracing::warn!(target = %binding.target_uri, "skipping binding with unregistered target");
            return;
        };

        let sources = self.resolve_principal(&principal, &binding.member);
        for source in &sources {
            for permission in &permissions {
                if !binding.is_deny && !privesc::is_privesc(permission) {
                    continue;
                }
                self.tuples.push(PermissionTuple {
                    source: Arc::clone(source),
                    permission: permission.clone(),
                    target: Arc::clone(&target),
                    provenance: Provenance {
                        via_containers: if binding.source_container_uri.is_empty() {
                            Vec::new()
                        } else {
                            vec![binding.source_container_uri.clone()]
                        },
                        via_roles: vec![binding.role.clone()],
                        conditional: binding.condition.is_some(),
                        conditions: binding
                            .condition
                            .iter()
                            .map(|c| c.expression.clone())
                            .collect(),
                    },
                    is_deny: binding.is_deny,
                });
            }
        }
    }

    /// Resolves one member to the registry resources acting as tuple
    /// sources, synthesizing leaf resources for principals that have no
    /// collected counterpart.
    fn resolve_principal(&self, principal: &Principal, raw_member: &str) -> Vec<Arc<Resource>> {
        match principal {
            Principal::User(_) => vec![self.leaf(asset::USER, raw_member)],
            Principal::Group(_) => vec![self.leaf(asset::GROUP, raw_member)],
            Principal::Domain { .. } => vec![self.leaf(asset::DOMAIN, raw_member)],
            Principal::AllUsers => vec![self.leaf(asset::ALL_USERS, "allUsers")],
            Principal::AllAuthenticatedUsers => {
                vec![self.leaf(asset::ALL_AUTHENTICATED_USERS, "allAuthenticatedUsers")]
            }
            Principal::ServiceAccount(p) | Principal::ServiceAgent(p) => {
                vec![self.resolve_service_account(p)]
            }
            Principal::WorkloadIdentity(WorkloadIdentity::KubernetesServiceAccount {
                project_id,
                namespace,
                name,
                raw,
            }) => {
                let mut resource = Resource::new(asset::WORKLOAD_IDENTITY, raw.as_str());
                resource.display_name = format!("{namespace}/{name}");
                resource.set_property(prop::PROJECT_ID, project_id);
                resource.set_property("namespace", namespace);
                if let Some(project_uri) = self.project_uri_for(project_id) {
                    resource.parent_uri = project_uri;
                }
                vec![self.registry.insert(resource)]
            }
            Principal::WorkloadIdentity(WorkloadIdentity::Pool { subject, uri, .. }) => {
                let mut resource = Resource::new(asset::WORKLOAD_IDENTITY, uri.as_str());
                resource.display_name = subject.clone();
                if let Some(project_uri) = self.project_uri_for_path(uri) {
                    resource.parent_uri = project_uri;
                }
                vec![self.registry.insert(resource)]
            }
            Principal::WorkforceIdentity { subject, uri, .. } => {
                let mut resource = Resource::new(asset::WORKFORCE_IDENTITY, uri.as_str());
                resource.display_name = subject.clone();
                vec![self.registry.insert(resource)]
            }
            Principal::PrincipalSet { uri } => self.resolve_principal_set(uri),
            Principal::BasicRole { role, project_id, .. } => {
                self.resolve_basic_role(*role, project_id)
            }
            Principal::Unknown { raw } => {
                tracing::warn!(member = %raw, "unrecognized member syntax");
                vec![self.leaf(asset::UNKNOWN, raw)]
            }
        }
    }

    fn leaf(&self, asset_type: &str, member: &str) -> Arc<Resource> {
        let mut resource = Resource::new(asset_type, member);
        resource.display_name = member.to_string();
        self.registry.insert(resource)
    }

    fn resolve_service_account(&self, principal: &EmailPrincipal) -> Arc<Resource> {
        if principal.deleted {
            let mut resource = Resource::new(
                asset::SERVICE_ACCOUNT,
                uri::unknown_service_account_uri(&principal.email),
            );
            resource.display_name = principal.email.clone();
            resource.set_property(prop::EMAIL, &principal.email);
            resource.set_property(prop::DELETED, "true");
            return self.registry.insert(resource);
        }
        if let Some(existing) = self.registry.service_account_by_email(&principal.email) {
            return existing;
        }
        let mut resource = Resource::new(
            asset::SERVICE_ACCOUNT,
            uri::unknown_service_account_uri(&principal.email),
        );
        resource.display_name = principal.email.clone();
        resource.set_property(prop::EMAIL, &principal.email);
        self.registry.insert(resource)
    }

    /// `principalSet://` wildcards. Service-account sets over a container
    /// expand against the collected accounts; anything else stays an
    /// unresolved placeholder.
    fn resolve_principal_set(&self, set_uri: &str) -> Vec<Arc<Resource>> {
        if let Some(rest) = set_uri.strip_prefix(CRM_PRINCIPAL_SET_PREFIX) {
            let segments: Vec<&str> = rest.split('/').collect();
            if segments.len() >= 4 && segments[2] == "type" {
                if segments[3] == "ServiceAccount" {
                    let container = format!("{}/{}", segments[0], segments[1]);
                    return self.service_accounts_under(&container);
                }
                return vec![self.placeholder_set(set_uri)];
            }
        }
        if set_uri.contains("workloadIdentityPools") {
            let mut resource = Resource::new(asset::WORKLOAD_IDENTITY, set_uri);
            resource.display_name = set_uri.to_string();
            if let Some(project_uri) = self.project_uri_for_path(set_uri) {
                resource.parent_uri = project_uri;
            }
            return vec![self.registry.insert(resource)];
        }
        vec![self.placeholder_set(set_uri)]
    }

    fn placeholder_set(&self, set_uri: &str) -> Arc<Resource> {
        let mut resource = Resource::new(asset::PRINCIPAL_SET, set_uri);
        resource.display_name = set_uri.to_string();
        self.registry.insert(resource)
    }

    /// Collected service accounts at or under one container: projects match
    /// by number, folders and organizations by ancestor chain.
    fn service_accounts_under(&self, container: &str) -> Vec<Arc<Resource>> {
        let container_uri = match container.strip_prefix("projects/") {
            Some(id_or_number) => {
                let number = self
                    .project_numbers
                    .get(id_or_number)
                    .map(String::as_str)
                    .unwrap_or(id_or_number);
                uri::container_uri(&format!("projects/{number}"))
            }
            None => uri::container_uri(container),
        };
        let mut accounts: Vec<Arc<Resource>> = self
            .registry
            .of_type(asset::SERVICE_ACCOUNT)
            .into_iter()
            .filter(|sa| {
                sa.parent_uri == container_uri
                    || self
                        .ancestry
                        .ancestors(&sa.parent_uri)
                        .iter()
                        .any(|a| a == &container_uri)
            })
            .collect();
        accounts.sort_by(|a, b| a.uri.cmp(&b.uri));
        accounts
    }

    /// `projectOwner:`-style members expand to the project's tracked basic
    /// role holders, each re-resolved in turn.
    fn resolve_basic_role(&self, role: BasicRole, project_id: &str) -> Vec<Arc<Resource>> {
        let members = match self.basic_roles.get(project_id) {
            Some(tracked) => match role {
                BasicRole::Owner => tracked.owners.clone(),
                BasicRole::Editor => tracked.editors.clone(),
                BasicRole::Viewer => tracked.viewers.clone(),
            },
            None => Vec::new(),
        };
        let mut resolved = Vec::new();
        for member in members {
            let principal = self.normalizer.normalize(&member);
            // Tracked members cannot themselves be convenience markers.
            if matches!(principal, Principal::BasicRole { .. }) {
                continue;
            }
            resolved.extend(self.resolve_principal(&principal, &member));
        }
        resolved
    }

    fn project_uri_for(&self, project_id: &str) -> Option<String> {
        let number = self.project_numbers.get(project_id)?;
        self.project_uris_by_number.get(number).cloned()
    }

    /// Project container URI for a path containing `projects/{id-or-number}`.
    fn project_uri_for_path(&self, path: &str) -> Option<String> {
        let start = path.find("projects/")? + "projects/".len();
        let end = path[start..].find('/').map(|i| start + i).unwrap_or(path.len());
        let id_or_number = &path[start..end];
        if let Some(found) = self.project_uris_by_number.get(id_or_number) {
            return Some(found.clone());
        }
        let number = self.project_numbers.get(id_or_number)?;
        self.project_uris_by_number.get(number).cloned()
    }
}
