//! Storage bucket collection.

use async_trait::async_trait;

use crate::http::storage::{Bucket, StorageClient};
use crate::http::{CancellationToken, Error};
use crate::model::{asset, prop, Policy, Resource};
use crate::uri;

use super::{ProjectContext, ResourceCollector};

pub struct StorageBucketCollector {
    client: StorageClient,
}

impl StorageBucketCollector {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }
}

fn bucket_resource(project: &ProjectContext, bucket: Bucket) -> Resource {
    let mut resource = Resource::new(
        asset::BUCKET,
        uri::resource_uri(
            uri::STORAGE,
            &format!("projects/{}/buckets/{}", project.number, bucket.name),
        ),
    );
    resource.parent_uri = project.uri.clone();
    resource.display_name = bucket.name.clone();
    resource.location = bucket.location;
    resource.set_property(prop::ID, bucket.id);
    resource.set_property(prop::PROJECT_ID, &project.project_id);
    resource.set_property(prop::PROJECT_NUMBER, &project.number);
    for (key, value) in bucket.labels {
        resource.set_label(&key, value);
    }
    resource
}

#[async_trait]
impl ResourceCollector for StorageBucketCollector {
    fn asset_type(&self) -> &'static str {
        asset::BUCKET
    }

    async fn list_in_project(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error> {
        let buckets = self.client.list_buckets(&project.project_id, cancel).await?;
        Ok(buckets
            .into_iter()
            .map(|b| bucket_resource(project, b))
            .collect())
    }

    async fn iam_policy(
        &self,
        resource: &Resource,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<Policy>, Error> {
        self.client
            .get_bucket_iam_policy(&resource.display_name, cancel)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converts_bucket_shape() {
        let project = ProjectContext {
            project_id: "p-alpha".to_string(),
            number: "222".to_string(),
            uri: "//cloudresourcemanager.googleapis.com/projects/222".to_string(),
        };
        let bucket = Bucket {
            id: "b1".to_string(),
            name: "b1".to_string(),
            project_number: "222".to_string(),
            location: "US".to_string(),
            labels: Default::default(),
        };
        let resource = bucket_resource(&project, bucket);
        assert_eq!(resource.uri, "//storage.googleapis.com/projects/222/buckets/b1");
        assert_eq!(resource.location, "US");
    }
}
