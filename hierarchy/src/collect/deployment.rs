//! Deployment Manager deployment collection. Deployments matter because
//! creating or updating one executes as the project's cloud-services agent.

use async_trait::async_trait;

use crate::http::deploymentmanager::{Deployment, DeploymentManagerClient};
use crate::http::{CancellationToken, Error};
use crate::model::{asset, prop, Policy, Resource};
use crate::uri;

use super::{ProjectContext, ResourceCollector};

pub struct DeploymentCollector {
    client: DeploymentManagerClient,
}

impl DeploymentCollector {
    pub fn new(client: DeploymentManagerClient) -> Self {
        Self { client }
    }
}

fn deployment_resource(project: &ProjectContext, deployment: Deployment) -> Resource {
    let mut resource = Resource::new(
        asset::DEPLOYMENT,
        uri::resource_uri(
            uri::DEPLOYMENTMANAGER,
            &format!(
                "projects/{}/global/deployments/{}",
                project.number, deployment.name
            ),
        ),
    );
    resource.parent_uri = project.uri.clone();
    resource.display_name = deployment.name;
    resource.set_property(prop::ID, deployment.id);
    resource.set_property(prop::PROJECT_ID, &project.project_id);
    resource.set_property(prop::PROJECT_NUMBER, &project.number);
    resource
}

#[async_trait]
impl ResourceCollector for DeploymentCollector {
    fn asset_type(&self) -> &'static str {
        asset::DEPLOYMENT
    }

    async fn list_in_project(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error> {
        let deployments = self
            .client
            .list_deployments(&project.project_id, cancel)
            .await?;
        Ok(deployments
            .into_iter()
            .map(|d| deployment_resource(project, d))
            .collect())
    }

    async fn iam_policy(
        &self,
        _resource: &Resource,
        _cancel: Option<CancellationToken>,
    ) -> Result<Option<Policy>, Error> {
        // Deployments carry no per-resource allow policy worth walking.
        Ok(None)
    }
}
