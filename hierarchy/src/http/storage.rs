//! Cloud Storage JSON API v1: buckets and their IAM policies.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use token_source::TokenSource;

use iamgraph_gax::retry::{invoke, invoke_fn};

use crate::http::{AuthorizedClient, CancellationToken, Error};
use crate::model::Policy;

const BASE_URL: &str = "https://storage.googleapis.com/storage/v1";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    pub project_number: String,
    pub location: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListBucketsResponse {
    items: Vec<Bucket>,
    next_page_token: String,
}

#[derive(Clone)]
pub struct StorageClient {
    inner: AuthorizedClient,
    base_url: String,
}

impl StorageClient {
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

    pub async fn list_buckets(
        &self,
        project_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Bucket>, Error> {
        let url = format!("{}/b", self.base_url);
        let mut buckets = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListBucketsResponse = invoke_fn(
                cancel.clone(),
                None,
                |token: String| {
                    let url = url.clone();
                    async move {
                        let mut request =
                            self.inner.http().get(&url).query(&[("project", project_id)]);
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
            buckets.extend(response.items);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(buckets);
            }
        }
    }

    pub async fn get_bucket_iam_policy(
        &self,
        bucket: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Policy, Error> {
        let url = format!("{}/b/{bucket}/iam", self.base_url);
        invoke(cancel, None, || {
            self.inner.send(
                self.inner
                    .http()
                    .get(&url)
                    .query(&[("optionsRequestedPolicyVersion", "3")]),
            )
        })
        .await
    }
}
