//! The hierarchy processor: orchestrates the collection passes, maintains
//! the canonical resource registry, resolves deferred principals, and emits
//! permission tuples and CONTAINS edges.

mod collect_phase;
mod container;
mod emit;
mod synthesis;

use std::collections::HashMap;
use std::sync::Arc;

use token_source::TokenSource;

use crate::ancestry::AncestryBuilder;
use crate::collect::ProjectContext;
use crate::config::ProcessorConfig;
use crate::http::compute::ComputeClient;
use crate::http::deploymentmanager::DeploymentManagerClient;
use crate::http::functions::FunctionsClient;
use crate::http::iam::IamClient;
use crate::http::resourcemanager::ResourceManagerClient;
use crate::http::run::RunClient;
use crate::http::secretmanager::SecretManagerClient;
use crate::http::storage::StorageClient;
use crate::http::CancellationToken;
use crate::member::MemberNormalizer;
use crate::model::{Condition, Resource};
use crate::output::{AnalysisOutput, ContainsEdge, PermissionTuple};
use crate::pab::PabEvaluator;
use crate::registry::ResourceRegistry;
use crate::roles::RoleExpander;
use crate::store::{CollectedState, OfflineStore};
use crate::Error;

/// The service clients an online run needs, constructed over one opaque
/// token source.
#[derive(Clone)]
pub struct ServiceClients {
    pub resource_manager: ResourceManagerClient,
    pub iam: IamClient,
    pub compute: ComputeClient,
    pub functions: FunctionsClient,
    pub run: RunClient,
    pub storage: StorageClient,
    pub secretmanager: SecretManagerClient,
    pub deploymentmanager: DeploymentManagerClient,
}

impl ServiceClients {
    pub fn new(http: reqwest::Client, ts: Arc<dyn TokenSource>) -> Self {
        Self {
            resource_manager: ResourceManagerClient::new(http.clone(), Arc::clone(&ts)),
            iam: IamClient::new(http.clone(), Arc::clone(&ts)),
            compute: ComputeClient::new(http.clone(), Arc::clone(&ts)),
            functions: FunctionsClient::new(http.clone(), Arc::clone(&ts)),
            run: RunClient::new(http.clone(), Arc::clone(&ts)),
            storage: StorageClient::new(http.clone(), Arc::clone(&ts)),
            secretmanager: SecretManagerClient::new(http.clone(), Arc::clone(&ts)),
            deploymentmanager: DeploymentManagerClient::new(http, ts),
        }
    }
}

/// A recorded (member, role, target) triple awaiting principal resolution.
/// Holds only strings so it can be buffered across both collection phases:
/// org-level bindings are seen before the service accounts they reference
/// exist in the registry.
#[derive(Clone, Debug)]
pub(crate) struct PendingBinding {
    pub member: String,
    /// Role name, or the denied permission literal for deny bindings.
    pub role: String,
    pub target_uri: String,
    pub condition: Option<Condition>,
    pub is_deny: bool,
    /// URI of the container whose policy produced the binding; empty for
    /// bindings attached directly to the target resource.
    pub source_container_uri: String,
}

/// Members holding the basic roles on one project, tracked for
/// `projectOwner:`-style convenience-member expansion.
#[derive(Clone, Debug, Default)]
pub(crate) struct BasicRoleMembers {
    pub owners: Vec<String>,
    pub editors: Vec<String>,
    pub viewers: Vec<String>,
}

pub struct HierarchyProcessor {
    pub(crate) config: ProcessorConfig,
    pub(crate) registry: ResourceRegistry,
    pub(crate) normalizer: MemberNormalizer,
    pub(crate) expander: RoleExpander,
    pub(crate) ancestry: AncestryBuilder,
    pub(crate) pab: PabEvaluator,
    pub(crate) pending: Vec<PendingBinding>,
    pub(crate) basic_roles: HashMap<String, BasicRoleMembers>,
    /// Project id → number.
    pub(crate) project_numbers: HashMap<String, String>,
    /// Project number → container URI.
    pub(crate) project_uris_by_number: HashMap<String, String>,
    pub(crate) projects: Vec<ProjectContext>,
    pub(crate) edges: Vec<ContainsEdge>,
    pub(crate) tuples: Vec<PermissionTuple>,
}

impl HierarchyProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            registry: ResourceRegistry::new(),
            normalizer: MemberNormalizer::new(),
            expander: RoleExpander::new(),
            ancestry: AncestryBuilder::new(),
            pab: PabEvaluator::new(),
            pending: Vec::new(),
            basic_roles: HashMap::new(),
            project_numbers: HashMap::new(),
            project_uris_by_number: HashMap::new(),
            projects: Vec::new(),
            edges: Vec::new(),
            tuples: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Online pipeline: collect and analyze in one run.
    pub async fn run_online(
        &mut self,
        clients: &ServiceClients,
        cancel: Option<CancellationToken>,
    ) -> Result<AnalysisOutput, Error> {
        tracing::info!(org = %self.config.org_id, "phase 1: roles");
        let roles = self.collect_roles_control(clients, cancel.clone()).await?;
        tracing::info!("phase 2: hierarchy");
        let hierarchy = self.collect_hierarchy(clients, cancel.clone()).await?;
        tracing::info!("phase 3: principal access boundaries");
        let pab = self.collect_pab(clients, &hierarchy, cancel.clone()).await;
        self.seed(&roles, &hierarchy, &pab);
        tracing::info!("phase 4: container pass");
        self.container_pass(&hierarchy);
        tracing::info!("phase 5: custom project roles");
        let project_roles = self.collect_project_roles(clients, cancel.clone()).await;
        self.expander.register_all(project_roles);
        tracing::info!("phase 6: resource collection");
        let resources = self.collect_resources(clients, cancel).await;
        self.ingest_resources(resources);
        tracing::info!("phase 7: principal resolution");
        Ok(self.finish())
    }

    /// Offline-collect pipeline: collect everything and persist.
    pub async fn run_offline_collect(
        &mut self,
        clients: &ServiceClients,
        cancel: Option<CancellationToken>,
    ) -> Result<(), Error> {
        let state = self.collect_state(clients, cancel).await?;
        OfflineStore::new(&self.config.data_dir).save(&state)
    }

    /// Offline-analyze pipeline: reload persisted state and re-derive
    /// without network access.
    pub fn run_offline_analyze(&mut self) -> Result<AnalysisOutput, Error> {
        let state = OfflineStore::new(&self.config.data_dir).load()?;
        Ok(self.analyze(state))
    }

    /// Analysis over already-collected state: container pass, resource
    /// ingestion, Google-managed synthesis, principal resolution.
    pub fn analyze(&mut self, state: CollectedState) -> AnalysisOutput {
        self.seed(&state.roles, &state.hierarchy, &state.pab);
        self.container_pass(&state.hierarchy);
        self.ingest_resources(state.resources);
        self.finish()
    }

    /// Registers collected resources, emits their CONTAINS edges, and
    /// buffers pending bindings for their allow policies.
    pub(crate) fn ingest_resources(&mut self, resources: Vec<Resource>) {
        let registered: Vec<Arc<Resource>> = resources
            .into_iter()
            .map(|resource| self.registry.insert(resource))
            .collect();

        for resource in &registered {
            if resource.parent_uri.is_empty() {
                continue;
            }
            if let Some(parent) = self.registry.get(&resource.parent_uri) {
                self.edges.push(ContainsEdge {
                    parent,
                    child: Arc::clone(resource),
                });
            }
        }

        for resource in &registered {
            if let Some(policy) = &resource.policies.allow {
                for binding in &policy.bindings {
                    for member in &binding.members {
                        self.pending.push(PendingBinding {
                            member: member.clone(),
                            role: binding.role.clone(),
                            target_uri: resource.uri.clone(),
                            condition: binding.condition.clone(),
                            is_deny: false,
                            source_container_uri: String::new(),
                        });
                    }
                }
            }
        }
    }

    /// Synthesis, principal resolution, and canonical ordering.
    fn finish(&mut self) -> AnalysisOutput {
        self.synthesize_google_managed();
        self.emit();
        let mut tuples = std::mem::take(&mut self.tuples);
        tuples.sort_by(|a, b| {
            (a.source.uri.as_str(), a.permission.as_str(), a.target.uri.as_str(), a.is_deny)
                .cmp(&(b.source.uri.as_str(), b.permission.as_str(), b.target.uri.as_str(), b.is_deny))
        });
        let mut edges = std::mem::take(&mut self.edges);
        edges.sort_by(|a, b| {
            (a.parent.uri.as_str(), a.child.uri.as_str())
                .cmp(&(b.parent.uri.as_str(), b.child.uri.as_str()))
        });
        tracing::info!(tuples = tuples.len(), edges = edges.len(), "analysis complete");
        AnalysisOutput { tuples, edges }
    }
}
