//! Collection orchestration: control-plane phases plus the 10-way project
//! fan-out that drives every resource collector.

use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use crate::collect::{
    is_silent, CloudFunctionCollector, CloudRunCollector, ComputeInstanceCollector,
    DeploymentCollector, HierarchyCollector, PabCollector, ProjectContext, ResourceCollector,
    RoleCollector, SecretCollector, ServiceAccountCollector, StorageBucketCollector,
};
use crate::config::is_system_project;
use crate::http::CancellationToken;
use crate::model::{asset, Folder, Hierarchy, PabState, Resource, Role};
use crate::store::{CollectedState, Metadata};
use crate::uri;
use crate::Error;

use super::{HierarchyProcessor, ServiceClients};

/// Every CAI asset type this engine collects.
pub(crate) const SUPPORTED_ASSET_TYPES: [&str; 7] = [
    asset::SERVICE_ACCOUNT,
    asset::INSTANCE,
    asset::FUNCTION,
    asset::RUN_SERVICE,
    asset::BUCKET,
    asset::SECRET,
    asset::DEPLOYMENT,
];

impl HierarchyProcessor {
    /// Predefined roles (fatal on failure) plus org-level custom roles
    /// (degraded on failure).
    pub(crate) async fn collect_roles_control(
        &self,
        clients: &ServiceClients,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Role>, Error> {
        let collector = RoleCollector::new(clients.iam.clone());
        let mut roles = collector.collect_predefined(cancel.clone()).await?;
        roles.extend(
            collector
                .collect_custom(&format!("organizations/{}", self.config.org_id), cancel)
                .await,
        );
        Ok(roles)
    }

    pub(crate) async fn collect_hierarchy(
        &self,
        clients: &ServiceClients,
        cancel: Option<CancellationToken>,
    ) -> Result<Hierarchy, Error> {
        let collector = HierarchyCollector::new(
            clients.resource_manager.clone(),
            clients.iam.clone(),
            self.config.collect_deny_policies,
            self.config.deny_page_interval,
        );
        Ok(collector.collect(&self.config.org_id, cancel).await?)
    }

    pub(crate) async fn collect_pab(
        &self,
        clients: &ServiceClients,
        hierarchy: &Hierarchy,
        cancel: Option<CancellationToken>,
    ) -> PabState {
        if !self.config.collect_pabs {
            return PabState::default();
        }
        let containers = container_names(hierarchy);
        PabCollector::new(clients.iam.clone())
            .collect(&self.config.org_id, &containers, cancel)
            .await
    }

    /// Per-project custom roles for the projects found by the container
    /// pass. Registered before emission so custom-role bindings expand.
    pub(crate) async fn collect_project_roles(
        &self,
        clients: &ServiceClients,
        cancel: Option<CancellationToken>,
    ) -> Vec<Role> {
        collect_project_roles(clients, &self.projects, cancel).await
    }

    pub(crate) async fn collect_resources(
        &self,
        clients: &ServiceClients,
        cancel: Option<CancellationToken>,
    ) -> Vec<Resource> {
        collect_resources(
            clients,
            &self.projects,
            &self.config.asset_types,
            self.config.concurrency,
            cancel,
        )
        .await
    }

    /// The full offline-collect sweep, producing the persistable state.
    pub(crate) async fn collect_state(
        &self,
        clients: &ServiceClients,
        cancel: Option<CancellationToken>,
    ) -> Result<CollectedState, Error> {
        let mut roles = self.collect_roles_control(clients, cancel.clone()).await?;
        let hierarchy = self.collect_hierarchy(clients, cancel.clone()).await?;
        let pab = self.collect_pab(clients, &hierarchy, cancel.clone()).await;
        let projects = project_contexts(&hierarchy, self.config.include_system_projects);
        roles.extend(collect_project_roles(clients, &projects, cancel.clone()).await);
        let resources = collect_resources(
            clients,
            &projects,
            &self.config.asset_types,
            self.config.concurrency,
            cancel,
        )
        .await;
        let metadata = Metadata::new(
            &self.config.org_id,
            self.config.collect_pabs,
            self.config.collect_deny_policies,
            self.effective_asset_types(),
        );
        Ok(CollectedState {
            metadata,
            hierarchy,
            roles,
            pab,
            resources,
        })
    }

    pub(crate) fn effective_asset_types(&self) -> Vec<String> {
        if self.config.asset_types.is_empty() {
            SUPPORTED_ASSET_TYPES.iter().map(|t| t.to_string()).collect()
        } else {
            self.config.asset_types.clone()
        }
    }
}

async fn collect_project_roles(
    clients: &ServiceClients,
    projects: &[ProjectContext],
    cancel: Option<CancellationToken>,
) -> Vec<Role> {
    let collector = RoleCollector::new(clients.iam.clone());
    let mut roles = Vec::new();
    for project in projects {
        roles.extend(
            collector
                .collect_custom(&format!("projects/{}", project.project_id), cancel.clone())
                .await,
        );
    }
    roles
}

/// Flattens the tree into project contexts, applying the system-project
/// filter.
pub(crate) fn project_contexts(hierarchy: &Hierarchy, include_system: bool) -> Vec<ProjectContext> {
    fn visit(
        folders: &[Folder],
        projects: &[crate::model::Project],
        include_system: bool,
        out: &mut Vec<ProjectContext>,
    ) {
        for project in projects {
            if !include_system
                && (is_system_project(&project.project_id) || is_system_project(&project.display_name))
            {
                continue;
            }
            out.push(ProjectContext {
                project_id: project.project_id.clone(),
                number: project.number().to_string(),
                uri: uri::container_uri(&project.name),
            });
        }
        for folder in folders {
            visit(&folder.folders, &folder.projects, include_system, out);
        }
    }
    let mut out = Vec::new();
    for org in &hierarchy.organizations {
        visit(&org.folders, &org.projects, include_system, &mut out);
    }
    out
}

/// Short names of every container in the tree, for binding collection.
pub(crate) fn container_names(hierarchy: &Hierarchy) -> Vec<String> {
    fn visit(folder: &Folder, out: &mut Vec<String>) {
        out.push(folder.name.clone());
        for child in &folder.folders {
            visit(child, out);
        }
        for project in &folder.projects {
            out.push(project.name.clone());
        }
    }
    let mut out = Vec::new();
    for org in &hierarchy.organizations {
        out.push(org.name.clone());
        for folder in &org.folders {
            visit(folder, &mut out);
        }
        for project in &org.projects {
            out.push(project.name.clone());
        }
    }
    out
}

fn build_collectors(
    clients: &ServiceClients,
    asset_types: &[String],
) -> Vec<Arc<dyn ResourceCollector>> {
    let all: Vec<Arc<dyn ResourceCollector>> = vec![
        Arc::new(ServiceAccountCollector::new(clients.iam.clone())),
        Arc::new(ComputeInstanceCollector::new(clients.compute.clone())),
        Arc::new(CloudFunctionCollector::new(clients.functions.clone())),
        Arc::new(CloudRunCollector::new(clients.run.clone())),
        Arc::new(StorageBucketCollector::new(clients.storage.clone())),
        Arc::new(SecretCollector::new(clients.secretmanager.clone())),
        Arc::new(DeploymentCollector::new(clients.deploymentmanager.clone())),
    ];
    if asset_types.is_empty() {
        return all;
    }
    all.into_iter()
        .filter(|c| asset_types.iter().any(|t| t == c.asset_type()))
        .collect()
}

/// Project fan-out: one task per project, each running every collector
/// sequentially within the project; at most `concurrency` in flight.
/// Silent per-project tolerance for disabled APIs and missing permissions.
async fn collect_resources(
    clients: &ServiceClients,
    projects: &[ProjectContext],
    asset_types: &[String],
    concurrency: usize,
    cancel: Option<CancellationToken>,
) -> Vec<Resource> {
    let collectors = build_collectors(clients, asset_types);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let accumulator: Arc<Mutex<Vec<Resource>>> = Arc::default();
    let mut tasks = Vec::with_capacity(projects.len());
    for project in projects.iter().cloned() {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let collectors = collectors.clone();
        let accumulator = Arc::clone(&accumulator);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = permit;
            for collector in &collectors {
                match collector.collect_with_policies(&project, cancel.clone()).await {
                    Ok(resources) => accumulator.lock().unwrap().extend(resources),
                    Err(e) if is_silent(&e) => {}
                    Err(e) => tracing::warn!(
                        project = %project.project_id,
                        asset_type = collector.asset_type(),
                        "resource collection failed: {e}"
                    ),
                }
            }
        }));
    }
    for task in tasks {
        let _ = task.await;
    }
    let result = std::mem::take(&mut *accumulator.lock().unwrap());
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{Organization, Project};

    fn tree() -> Hierarchy {
        Hierarchy {
            organizations: vec![Organization {
                name: "organizations/111".to_string(),
                display_name: "example.com".to_string(),
                policies: Default::default(),
                folders: vec![Folder {
                    name: "folders/1".to_string(),
                    display_name: "eng".to_string(),
                    parent: "organizations/111".to_string(),
                    policies: Default::default(),
                    folders: vec![],
                    projects: vec![Project {
                        name: "projects/333".to_string(),
                        project_id: "sys-managed".to_string(),
                        parent: "folders/1".to_string(),
                        display_name: "managed".to_string(),
                        policies: Default::default(),
                    }],
                }],
                projects: vec![Project {
                    name: "projects/222".to_string(),
                    project_id: "p-alpha".to_string(),
                    parent: "organizations/111".to_string(),
                    display_name: "alpha".to_string(),
                    policies: Default::default(),
                }],
            }],
        }
    }

    #[test]
    fn project_contexts_apply_system_filter() {
        let contexts = project_contexts(&tree(), false);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].project_id, "p-alpha");
        assert_eq!(contexts[0].number, "222");

        let with_system = project_contexts(&tree(), true);
        assert_eq!(with_system.len(), 2);
    }

    #[test]
    fn container_names_cover_the_tree() {
        let names = container_names(&tree());
        assert_eq!(
            names,
            vec![
                "organizations/111".to_string(),
                "folders/1".to_string(),
                "projects/333".to_string(),
                "projects/222".to_string(),
            ]
        );
    }
}
