//! Secret Manager secret collection.

use async_trait::async_trait;

use crate::http::secretmanager::{Secret, SecretManagerClient};
use crate::http::{CancellationToken, Error};
use crate::model::{asset, prop, Policy, Resource};
use crate::uri;

use super::{ProjectContext, ResourceCollector};

pub struct SecretCollector {
    client: SecretManagerClient,
}

impl SecretCollector {
    pub fn new(client: SecretManagerClient) -> Self {
        Self { client }
    }
}

fn secret_resource(project: &ProjectContext, secret: Secret) -> Resource {
    let short_name = secret
        .name
        .rsplit('/')
        .next()
        .unwrap_or(secret.name.as_str())
        .to_string();
    let mut resource = Resource::new(
        asset::SECRET,
        uri::resource_uri(
            uri::SECRETMANAGER,
            &format!("projects/{}/secrets/{short_name}", project.number),
        ),
    );
    resource.parent_uri = project.uri.clone();
    resource.display_name = short_name;
    resource.set_property(prop::ID, secret.name);
    resource.set_property(prop::PROJECT_ID, &project.project_id);
    resource.set_property(prop::PROJECT_NUMBER, &project.number);
    for (key, value) in secret.labels {
        resource.set_label(&key, value);
    }
    resource
}

#[async_trait]
impl ResourceCollector for SecretCollector {
    fn asset_type(&self) -> &'static str {
        asset::SECRET
    }

    async fn list_in_project(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error> {
        let secrets = self.client.list_secrets(&project.project_id, cancel).await?;
        Ok(secrets
            .into_iter()
            .map(|s| secret_resource(project, s))
            .collect())
    }

    async fn iam_policy(
        &self,
        resource: &Resource,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<Policy>, Error> {
        let Some(name) = resource.property(prop::ID) else {
            return Ok(None);
        };
        self.client.get_iam_policy(name, cancel).await.map(Some)
    }
}
