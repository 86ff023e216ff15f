//! Container pass: depth-first over the collected tree, registering
//! containers, fanning their bindings out to descendant projects, and
//! emitting CONTAINS edges for immediate children.

use std::sync::Arc;

use crate::collect::ProjectContext;
use crate::config::is_system_project;
use crate::model::{asset, prop, Binding, Folder, Hierarchy, Organization, PabState, Policies, Project, Resource, Role};
use crate::output::ContainsEdge;
use crate::pab::PabEvaluator;
use crate::uri;

use super::{HierarchyProcessor, PendingBinding};

impl HierarchyProcessor {
    /// Seeds the role expander, ancestry index, and PAB evaluator from
    /// collected control-plane state. Must run before the container pass.
    pub(crate) fn seed(&mut self, roles: &[Role], hierarchy: &Hierarchy, pab: &PabState) {
        self.expander.register_all(roles.iter().cloned());
        for org in &hierarchy.organizations {
            let org_uri = uri::container_uri(&org.name);
            self.ancestry.add_organization(org_uri.as_str(), org.display_name.as_str());
            for folder in &org.folders {
                self.seed_folder(folder, &org_uri);
            }
            for project in &org.projects {
                self.seed_project(project, &org_uri);
            }
        }
        self.pab = PabEvaluator::build(pab, &self.normalizer);
    }

    fn seed_folder(&mut self, folder: &Folder, parent_uri: &str) {
        let folder_uri = uri::container_uri(&folder.name);
        self.ancestry
            .add_folder(folder_uri.as_str(), parent_uri, folder.display_name.as_str());
        for child in &folder.folders {
            self.seed_folder(child, &folder_uri);
        }
        for project in &folder.projects {
            self.seed_project(project, &folder_uri);
        }
    }

    fn seed_project(&mut self, project: &Project, parent_uri: &str) {
        if self.skip_project(project) {
            return;
        }
        let number = project.number().to_string();
        let project_uri = uri::container_uri(&project.name);
        self.ancestry.add_project(
            project_uri.as_str(),
            parent_uri,
            project.project_id.as_str(),
            number.as_str(),
            project.display_name.as_str(),
        );
        self.project_numbers.insert(project.project_id.clone(), number.clone());
        self.project_uris_by_number.insert(number.clone(), project_uri.clone());
        self.projects.push(ProjectContext {
            project_id: project.project_id.clone(),
            number,
            uri: project_uri,
        });
    }

    pub(crate) fn skip_project(&self, project: &Project) -> bool {
        !self.config.include_system_projects
            && (is_system_project(&project.project_id) || is_system_project(&project.display_name))
    }

    pub(crate) fn container_pass(&mut self, hierarchy: &Hierarchy) {
        for org in &hierarchy.organizations {
            self.visit_organization(org);
        }
    }

    fn visit_organization(&mut self, org: &Organization) {
        let org_uri = uri::container_uri(&org.name);
        let mut resource = Resource::new(asset::ORGANIZATION, org_uri.as_str());
        resource.display_name = org.display_name.clone();
        resource.set_property(prop::ID, &org.name);
        resource.policies = org.policies.clone();
        let org_arc = self.registry.insert(resource);
        self.store_container_bindings(&org_uri, &org.policies, None);
        for folder in &org.folders {
            self.visit_folder(folder, &org_arc);
        }
        for project in &org.projects {
            self.visit_project(project, &org_arc);
        }
    }

    fn visit_folder(&mut self, folder: &Folder, parent: &Arc<Resource>) {
        let folder_uri = uri::container_uri(&folder.name);
        let mut resource = Resource::new(asset::FOLDER, folder_uri.as_str());
        resource.parent_uri = parent.uri.clone();
        resource.display_name = folder.display_name.clone();
        resource.set_property(prop::ID, &folder.name);
        resource.policies = folder.policies.clone();
        let arc = self.registry.insert(resource);
        self.edges.push(ContainsEdge {
            parent: Arc::clone(parent),
            child: Arc::clone(&arc),
        });
        self.store_container_bindings(&folder_uri, &folder.policies, None);
        for child in &folder.folders {
            self.visit_folder(child, &arc);
        }
        for project in &folder.projects {
            self.visit_project(project, &arc);
        }
    }

    fn visit_project(&mut self, project: &Project, parent: &Arc<Resource>) {
        if self.skip_project(project) {
            return;
        }
        let project_uri = uri::container_uri(&project.name);
        let mut resource = Resource::new(asset::PROJECT, project_uri.as_str());
        resource.parent_uri = parent.uri.clone();
        resource.display_name = project.display_name.clone();
        resource.set_property(prop::ID, &project.name);
        resource.set_property(prop::PROJECT_ID, &project.project_id);
        resource.set_property(prop::PROJECT_NUMBER, project.number());
        resource.policies = project.policies.clone();
        let arc = self.registry.insert(resource);
        self.edges.push(ContainsEdge {
            parent: Arc::clone(parent),
            child: arc,
        });
        self.store_container_bindings(&project_uri, &project.policies, Some(&project.project_id));
    }

    /// Buffers the container's bindings, fanned out to every descendant
    /// project as target: a binding at the org produces one pending binding
    /// per project under the org. Deny rules enumerate permissions directly.
    fn store_container_bindings(
        &mut self,
        container_uri: &str,
        policies: &Policies,
        project_id: Option<&str>,
    ) {
        let targets = self.ancestry.project_uris_under(container_uri);
        if let Some(policy) = &policies.allow {
            for binding in &policy.bindings {
                if let Some(project_id) = project_id {
                    self.track_basic_role(project_id, binding);
                }
                for member in &binding.members {
                    for target in &targets {
                        self.pending.push(PendingBinding {
                            member: member.clone(),
                            role: binding.role.clone(),
                            target_uri: target.clone(),
                            condition: binding.condition.clone(),
                            is_deny: false,
                            source_container_uri: container_uri.to_string(),
                        });
                    }
                }
            }
        }
        for deny in &policies.deny {
            for rule in &deny.rules {
                for principal in &rule.denied_principals {
                    for permission in &rule.denied_permissions {
                        for target in &targets {
                            self.pending.push(PendingBinding {
                                member: principal.clone(),
                                role: permission.clone(),
                                target_uri: target.clone(),
                                condition: rule.condition.clone(),
                                is_deny: true,
                                source_container_uri: container_uri.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    fn track_basic_role(&mut self, project_id: &str, binding: &Binding) {
        if !matches!(binding.role.as_str(), "roles/owner" | "roles/editor" | "roles/viewer") {
            return;
        }
        let tracked = self.basic_roles.entry(project_id.to_string()).or_default();
        match binding.role.as_str() {
            "roles/owner" => tracked.owners.extend(binding.members.iter().cloned()),
            "roles/editor" => tracked.editors.extend(binding.members.iter().cloned()),
            _ => tracked.viewers.extend(binding.members.iter().cloned()),
        }
    }
}
