//! Cloud Functions v1: locations and the functions deployed in them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use token_source::TokenSource;

use iamgraph_gax::retry::{invoke, invoke_fn};

use crate::http::{AuthorizedClient, CancellationToken, Error};
use crate::model::Policy;

const BASE_URL: &str = "https://cloudfunctions.googleapis.com/v1";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    /// `projects/{project}/locations/{location}`.
    pub name: String,
    pub location_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListLocationsResponse {
    locations: Vec<Location>,
    next_page_token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudFunction {
    /// `projects/{project}/locations/{location}/functions/{function}`.
    pub name: String,
    pub status: String,
    pub runtime: String,
    pub service_account_email: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListFunctionsResponse {
    functions: Vec<CloudFunction>,
    next_page_token: String,
}

#[derive(Clone)]
pub struct FunctionsClient {
    inner: AuthorizedClient,
    base_url: String,
}

impl FunctionsClient {
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

    pub async fn list_locations(
        &self,
        project_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Location>, Error> {
        let url = format!("{}/projects/{project_id}/locations", self.base_url);
        let mut locations = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListLocationsResponse = invoke_fn(
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
            locations.extend(response.locations);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(locations);
            }
        }
    }

    pub async fn list_functions(
        &self,
        project_id: &str,
        location: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<CloudFunction>, Error> {
        let url = format!(
            "{}/projects/{project_id}/locations/{location}/functions",
            self.base_url
        );
        let mut functions = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListFunctionsResponse = invoke_fn(
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
            functions.extend(response.functions);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(functions);
            }
        }
    }

    /// Fetches the allow policy of one function by full resource name.
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
