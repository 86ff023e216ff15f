//! Cloud Run service collection: one task per location.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::http::run::{RunClient, Service};
use crate::http::{CancellationToken, Error};
use crate::model::{asset, prop, Policy, Resource};
use crate::uri;

use super::{is_silent, ProjectContext, ResourceCollector, MAX_CONCURRENCY};

pub struct CloudRunCollector {
    client: RunClient,
}

impl CloudRunCollector {
    pub fn new(client: RunClient) -> Self {
        Self { client }
    }
}

fn service_resource(project: &ProjectContext, location: &str, service: Service) -> Resource {
    let short_name = service
        .name
        .rsplit('/')
        .next()
        .unwrap_or(service.name.as_str())
        .to_string();
    let mut resource = Resource::new(
        asset::RUN_SERVICE,
        uri::resource_uri(
            uri::RUN,
            &format!(
                "projects/{}/locations/{location}/services/{short_name}",
                project.number
            ),
        ),
    );
    resource.parent_uri = project.uri.clone();
    resource.display_name = short_name;
    resource.location = location.to_string();
    resource.set_property(prop::ID, service.name);
    resource.set_property(prop::PROJECT_ID, &project.project_id);
    resource.set_property(prop::PROJECT_NUMBER, &project.number);
    if !service.template.service_account.is_empty() {
        resource.set_property(prop::SERVICE_ACCOUNT, service.template.service_account);
    }
    for (key, value) in service.labels {
        resource.set_label(&key, value);
    }
    resource
}

#[async_trait]
impl ResourceCollector for CloudRunCollector {
    fn asset_type(&self) -> &'static str {
        asset::RUN_SERVICE
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
                    .list_services(&project.project_id, &location_id, cancel)
                    .await
                {
                    Ok(services) => {
                        let converted: Vec<Resource> = services
                            .into_iter()
                            .map(|s| service_resource(&project, &location_id, s))
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
    use crate::http::run::RevisionTemplate;

    #[test]
    fn converts_service_shape() {
        let project = ProjectContext {
            project_id: "p-alpha".to_string(),
            number: "222".to_string(),
            uri: "//cloudresourcemanager.googleapis.com/projects/222".to_string(),
        };
        let service = Service {
            name: "projects/p-alpha/locations/europe-west1/services/api".to_string(),
            uid: "abc".to_string(),
            uri: "https://api-abc.a.run.app".to_string(),
            template: RevisionTemplate {
                service_account: "run@p-alpha.iam.gserviceaccount.com".to_string(),
            },
            labels: Default::default(),
        };
        let resource = service_resource(&project, "europe-west1", service);
        assert_eq!(
            resource.uri,
            "//run.googleapis.com/projects/222/locations/europe-west1/services/api"
        );
        assert_eq!(
            resource.property(prop::SERVICE_ACCOUNT),
            Some("run@p-alpha.iam.gserviceaccount.com")
        );
    }
}
