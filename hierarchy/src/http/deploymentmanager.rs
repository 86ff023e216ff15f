//! Deployment Manager v2: deployments per project.

use std::sync::Arc;

use serde::Deserialize;
use token_source::TokenSource;

use iamgraph_gax::retry::invoke_fn;

use crate::http::{AuthorizedClient, CancellationToken, Error};

const BASE_URL: &str = "https://deploymentmanager.googleapis.com/deploymentmanager/v2";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub insert_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListDeploymentsResponse {
    deployments: Vec<Deployment>,
    next_page_token: String,
}

#[derive(Clone)]
pub struct DeploymentManagerClient {
    inner: AuthorizedClient,
    base_url: String,
}

impl DeploymentManagerClient {
    pub fn new(http: reqwest::Client, ts: Arc<dyn TokenSource>) -> Self {
        Self {
            inner: AuthorizedClient::new(http, ts),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn list_deployments(
        &self,
        project_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Deployment>, Error> {
        let url = format!("{}/projects/{project_id}/global/deployments", self.base_url);
        let mut deployments = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListDeploymentsResponse = invoke_fn(
                cancel.clone(),
                None,
                |token: String| {
                    let url = url.clone();
                    async move {
                        let mut request = self.inner.http().get(&url);
                        if !token.is_empty() {
                            request = request.query(&[("pageToken", token.as_str())]);
                        }
                        match self.inner.send(request).await {
                            Ok(r) => Ok(r),
                            Err(e) => Err((e, token)),
                        }
                    }
                },
                page_token,
            )
            .await?;
            deployments.extend(response.deployments);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(deployments);
            }
        }
    }
}
