//! Cloud Function collection: one task per location.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::http::functions::{CloudFunction, FunctionsClient};
use crate::http::{CancellationToken, Error};
use crate::model::{asset, prop, Policy, Resource};
use crate::uri;

use super::{is_silent, ProjectContext, ResourceCollector, MAX_CONCURRENCY};

pub struct CloudFunctionCollector {
    client: FunctionsClient,
}

impl CloudFunctionCollector {
    pub fn new(client: FunctionsClient) -> Self {
        Self { client }
    }
}

fn function_resource(project: &ProjectContext, location: &str, function: CloudFunction) -> Resource {
    let short_name = function
        .name
        .rsplit('/')
        .next()
        .unwrap_or(function.name.as_str())
        .to_string();
    let mut resource = Resource::new(
        asset::FUNCTION,
        uri::resource_uri(
            uri::FUNCTIONS,
            &format!(
                "projects/{}/locations/{location}/functions/{short_name}",
                project.number
            ),
        ),
    );
    resource.parent_uri = project.uri.clone();
    resource.display_name = short_name;
    resource.location = location.to_string();
    // The v1 resource name is what the IAM surface addresses.
    resource.set_property(prop::ID, function.name);
    resource.set_property(prop::PROJECT_ID, &project.project_id);
    resource.set_property(prop::PROJECT_NUMBER, &project.number);
    if !function.service_account_email.is_empty() {
        resource.set_property(prop::SERVICE_ACCOUNT, function.service_account_email);
    }
    for (key, value) in function.labels {
        resource.set_label(&key, value);
    }
    resource
}

#[async_trait]
impl ResourceCollector for CloudFunctionCollector {
    fn asset_type(&self) -> &'static str {
        asset::FUNCTION
    }

    async fn list_in_project(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error> {
        let locations = self
            .client
            .list_locations(&project.project_id, cancel.clone())
            .await?;
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENCY));
        let accumulator: Arc<Mutex<Vec<Resource>>> = Arc::default();
        let mut tasks = Vec::with_capacity(locations.len());
        for location in locations {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let client = self.client.clone();
            let project = project.clone();
            let accumulator = Arc::clone(&accumulator);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let location_id = if location.location_id.is_empty() {
                    location.name.rsplit('/').next().unwrap_or_default().to_string()
                } else {
                    location.location_id
                };
                match client
                    .list_functions(&project.project_id, &location_id, cancel)
                    .await
                {
                    Ok(functions) => {
                        let converted: Vec<Resource> = functions
                            .into_iter()
                            .map(|f| function_resource(&project, &location_id, f))
                            .collect();
                        accumulator.lock().unwrap().extend(converted);
                    }
                    Err(e) if is_silent(&e) => {}
                    Err(e) => tracing::warn!(location = %location_id, "skipping location: {e}"),
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
        let resources = std::mem::take(&mut *accumulator.lock().unwrap());
        Ok(resources)
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converts_function_shape() {
        let project = ProjectContext {
            project_id: "p-alpha".to_string(),
            number: "222".to_string(),
            uri: "//cloudresourcemanager.googleapis.com/projects/222".to_string(),
        };
        let function = CloudFunction {
            name: "projects/p-alpha/locations/us-central1/functions/resize".to_string(),
            status: "ACTIVE".to_string(),
            runtime: "python311".to_string(),
            service_account_email: "fn@p-alpha.iam.gserviceaccount.com".to_string(),
            labels: Default::default(),
        };
        let resource = function_resource(&project, "us-central1", function);
        assert_eq!(
            resource.uri,
            "//cloudfunctions.googleapis.com/projects/222/locations/us-central1/functions/resize"
        );
        assert_eq!(resource.display_name, "resize");
        assert_eq!(
            resource.property(prop::ID),
            Some("projects/p-alpha/locations/us-central1/functions/resize")
        );
    }
}
