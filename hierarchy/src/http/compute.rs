//! Compute Engine v1: zones and the instances in them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use token_source::TokenSource;

use iamgraph_gax::retry::{invoke, invoke_fn};

use crate::http::{AuthorizedClient, CancellationToken, Error};
use crate::model::Policy;

const BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Zone {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListZonesResponse {
    items: Vec<Zone>,
    next_page_token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachedServiceAccount {
    pub email: String,
    pub scopes: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instance {
    /// Numeric id, serialized as a string on the wire.
    pub id: String,
    pub name: String,
    pub status: String,
    pub machine_type: String,
    pub service_accounts: Vec<AttachedServiceAccount>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListInstancesResponse {
    items: Vec<Instance>,
    next_page_token: String,
}

#[derive(Clone)]
pub struct ComputeClient {
    inner: AuthorizedClient,
    base_url: String,
}

impl ComputeClient {
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

    pub async fn list_zones(
        &self,
        project_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Zone>, Error> {
        let url = format!("{}/projects/{project_id}/zones", self.base_url);
        let mut zones = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListZonesResponse = invoke_fn(
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
            zones.extend(response.items);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(zones);
            }
        }
    }

    pub async fn list_instances(
        &self,
        project_id: &str,
        zone: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Instance>, Error> {
        let url = format!("{}/projects/{project_id}/zones/{zone}/instances", self.base_url);
        let mut instances = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListInstancesResponse = invoke_fn(
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
            instances.extend(response.items);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(instances);
            }
        }
    }

    pub async fn get_instance_iam_policy(
        &self,
        project_id: &str,
        zone: &str,
        instance: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Policy, Error> {
        let url = format!(
            "{}/projects/{project_id}/zones/{zone}/instances/{instance}/getIamPolicy",
            self.base_url
        );
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
