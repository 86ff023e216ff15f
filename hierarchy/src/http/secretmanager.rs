//! Secret Manager v1: secrets and their IAM policies.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use token_source::TokenSource;

use iamgraph_gax::retry::{invoke, invoke_fn};

use crate::http::{AuthorizedClient, CancellationToken, Error};
use crate::model::Policy;

const BASE_URL: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
    /// `projects/{project}/secrets/{secret}`.
    pub name: String,
    pub create_time: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListSecretsResponse {
    secrets: Vec<Secret>,
    next_page_token: String,
}

#[derive(Clone)]
pub struct SecretManagerClient {
    inner: AuthorizedClient,
    base_url: String,
}

impl SecretManagerClient {
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

    pub async fn list_secrets(
        &self,
        project_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Secret>, Error> {
        let url = format!("{}/projects/{project_id}/secrets", self.base_url);
        let mut secrets = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListSecretsResponse = invoke_fn(
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
            secrets.extend(response.secrets);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(secrets);
            }
        }
    }

    /// Fetches the allow policy of one secret by full resource name.
    pub async fn get_iam_policy(
        &self,
        name: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Policy, Error> {
        let url = format!("{}/{name}:getIamPolicy", self.base_url);
        invoke(cancel, None, || {
            self.inner.send(
                self.inner
                    .http()
                    .get(&url)
                    .query(&[("options.requestedPolicyVersion", "3")]),
            )
        })
        .await
    }
}
