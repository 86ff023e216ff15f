//! Compute instance collection: one task per zone, at most
//! [`MAX_CONCURRENCY`](super::MAX_CONCURRENCY) in flight.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::http::compute::{ComputeClient, Instance};
use crate::http::{CancellationToken, Error};
use crate::model::{asset, prop, Policy, Resource};
use crate::uri;

use super::{is_silent, ProjectContext, ResourceCollector, MAX_CONCURRENCY};

pub struct ComputeInstanceCollector {
    client: ComputeClient,
}

impl ComputeInstanceCollector {
    pub fn new(client: ComputeClient) -> Self {
        Self { client }
    }
}

fn instance_resource(project: &ProjectContext, zone: &str, instance: Instance) -> Resource {
    let mut resource = Resource::new(
        asset::INSTANCE,
        uri::resource_uri(
            uri::COMPUTE,
            &format!(
                "projects/{}/zones/{zone}/instances/{}",
                project.number, instance.name
            ),
        ),
    );
    resource.parent_uri = project.uri.clone();
    resource.display_name = instance.name;
    resource.location = zone.to_string();
    resource.set_property(prop::ID, instance.id);
    resource.set_property(prop::ZONE, zone);
    resource.set_property(prop::PROJECT_ID, &project.project_id);
    resource.set_property(prop::PROJECT_NUMBER, &project.number);
    if let Some(sa) = instance.service_accounts.first() {
        resource.set_property(prop::SERVICE_ACCOUNT, &sa.email);
    }
    for (key, value) in instance.labels {
        resource.set_label(&key, value);
    }
    resource
}

#[async_trait]
impl ResourceCollector for ComputeInstanceCollector {
    fn asset_type(&self) -> &'static str {
        asset::INSTANCE
    }

    async fn list_in_project(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error> {
        let zones = self.client.list_zones(&project.project_id, cancel.clone()).await?;
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENCY));
        let accumulator: Arc<Mutex<Vec<Resource>>> = Arc::default();
        let mut tasks = Vec::with_capacity(zones.len());
        for zone in zones {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let client = self.client.clone();
            let project = project.clone();
            let accumulator = Arc::clone(&accumulator);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                match client.list_instances(&project.project_id, &zone.name, cancel).await {
                    Ok(instances) => {
                        let converted: Vec<Resource> = instances
                            .into_iter()
                            .map(|i| instance_resource(&project, &zone.name, i))
                            .collect();
                        accumulator.lock().unwrap().extend(converted);
                    }
                    Err(e) if is_silent(&e) => {}
                    Err(e) => tracing::warn!(zone = %zone.name, "skipping zone: {e}"),
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
        let (Some(project_id), Some(zone)) = (
            resource.property(prop::PROJECT_ID),
            resource.property(prop::ZONE),
        ) else {
            return Ok(None);
        };
        self.client
            .get_instance_iam_policy(project_id, zone, &resource.display_name, cancel)
            .await
            .map(Some)
    }
}
