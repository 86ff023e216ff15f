//! Collectors: fetch entities from the cloud and shape them into
//! [`Resource`]s. Regional collectors fan out one task per region or zone
//! under a bounded semaphore; missing-API and permission-denied failures in
//! a region are ignored silently, anything else degrades to a warning.

pub mod compute;
pub mod deployment;
pub mod functions;
pub mod hierarchy;
pub mod pab;
pub mod roles;
pub mod run;
pub mod secret;
pub mod service_account;
pub mod storage;

use async_trait::async_trait;

use crate::http::{CancellationToken, Error};
use crate::model::{Policy, Resource};

pub use compute::ComputeInstanceCollector;
pub use deployment::DeploymentCollector;
pub use functions::CloudFunctionCollector;
pub use hierarchy::HierarchyCollector;
pub use pab::PabCollector;
pub use roles::RoleCollector;
pub use run::CloudRunCollector;
pub use secret::SecretCollector;
pub use service_account::ServiceAccountCollector;
pub use storage::StorageBucketCollector;

/// Fan-out width for region/zone collection.
pub(crate) const MAX_CONCURRENCY: usize = 10;

/// The project a collector is currently working in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectContext {
    pub project_id: String,
    pub number: String,
    /// `//cloudresourcemanager.googleapis.com/projects/{number}`.
    pub uri: String,
}

/// Errors that are ignored without a warning during resource collection.
pub(crate) fn is_silent(error: &Error) -> bool {
    error.is_permission_denied() || error.is_service_disabled()
}

/// One resource kind's collector. `collect_with_policies` is the entry
/// point the processor drives per project.
#[async_trait]
pub trait ResourceCollector: Send + Sync {
    /// CAI asset type this collector produces.
    fn asset_type(&self) -> &'static str;

    async fn list_in_project(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error>;

    /// Allow policy of one listed resource, when the service exposes one.
    async fn iam_policy(
        &self,
        resource: &Resource,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<Policy>, Error>;

    async fn collect_with_policies(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error> {
        let mut resources = self.list_in_project(project, cancel.clone()).await?;
        for resource in &mut resources {
            match self.iam_policy(resource, cancel.clone()).await {
                Ok(Some(mut policy)) => {
                    policy.resource_uri = resource.uri.clone();
                    resource.policies.allow = Some(policy);
                }
                Ok(None) => {}
                Err(e) if is_silent(&e) => {}
                Err(e) => {
                    tracing::warn!(uri = %resource.uri, "failed to fetch IAM policy: {e}");
                }
            }
        }
        Ok(resources)
    }
}
