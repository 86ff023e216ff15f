//! Service-account collection. The per-account allow policy records who may
//! act as the account, which is the core impersonation edge.

use async_trait::async_trait;

use crate::http::iam::{IamClient, ServiceAccount};
use crate::http::{CancellationToken, Error};
use crate::model::{asset, prop, Policy, Resource};
use crate::uri;

use super::{ProjectContext, ResourceCollector};

pub struct ServiceAccountCollector {
    client: IamClient,
}

impl ServiceAccountCollector {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

fn service_account_resource(project: &ProjectContext, account: ServiceAccount) -> Resource {
    let mut resource = Resource::new(
        asset::SERVICE_ACCOUNT,
        uri::service_account_uri(&project.number, &account.email),
    );
    resource.parent_uri = project.uri.clone();
    resource.display_name = if account.display_name.is_empty() {
        account.email.clone()
    } else {
        account.display_name
    };
    resource.set_property(prop::ID, account.unique_id);
    resource.set_property(prop::EMAIL, account.email);
    resource.set_property(prop::PROJECT_ID, &project.project_id);
    resource.set_property(prop::PROJECT_NUMBER, &project.number);
    resource
}

#[async_trait]
impl ResourceCollector for ServiceAccountCollector {
    fn asset_type(&self) -> &'static str {
        asset::SERVICE_ACCOUNT
    }

    async fn list_in_project(
        &self,
        project: &ProjectContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Resource>, Error> {
        let accounts = self
            .client
            .list_service_accounts(&project.project_id, cancel)
            .await?;
        Ok(accounts
            .into_iter()
            .map(|a| service_account_resource(project, a))
            .collect())
    }

    async fn iam_policy(
        &self,
        resource: &Resource,
        cancel: Option<CancellationToken>,
    ) -> Result<Option<Policy>, Error> {
        let (Some(project_id), Some(email)) = (
            resource.property(prop::PROJECT_ID),
            resource.property(prop::EMAIL),
        ) else {
            return Ok(None);
        };
        self.client
            .get_service_account_iam_policy(project_id, email, cancel)
            .await
            .map(Some)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn converts_service_account_shape() {
        let project = ProjectContext {
            project_id: "p-alpha".to_string(),
            number: "222".to_string(),
            uri: "//cloudresourcemanager.googleapis.com/projects/222".to_string(),
        };
        let account = ServiceAccount {
            name: "projects/p-alpha/serviceAccounts/app@p-alpha.iam.gserviceaccount.com".to_string(),
            project_id: "p-alpha".to_string(),
            unique_id: "1057".to_string(),
            email: "app@p-alpha.iam.gserviceaccount.com".to_string(),
            display_name: "app runner".to_string(),
            disabled: false,
        };
        let resource = service_account_resource(&project, account);
        assert_eq!(
            resource.uri,
            "//iam.googleapis.com/projects/222/serviceAccounts/app@p-alpha.iam.gserviceaccount.com"
        );
        assert_eq!(resource.property(prop::EMAIL), Some("app@p-alpha.iam.gserviceaccount.com"));
        assert_eq!(resource.display_name, "app runner");
    }
}
