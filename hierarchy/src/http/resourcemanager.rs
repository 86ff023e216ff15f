//! Cloud Resource Manager v3: organizations, folders, projects, and the
//! allow policies attached to them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use token_source::TokenSource;

use iamgraph_gax::retry::{invoke, invoke_fn};

use crate::http::{AuthorizedClient, CancellationToken, Error};
use crate::model::Policy;

const BASE_URL: &str = "https://cloudresourcemanager.googleapis.com/v3";
const PAGE_SIZE: &str = "300";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Organization {
    /// `organizations/{number}`.
    pub name: String,
    pub display_name: String,
    pub state: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Folder {
    /// `folders/{number}`.
    pub name: String,
    pub parent: String,
    pub display_name: String,
    pub state: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    /// `projects/{number}`.
    pub name: String,
    pub parent: String,
    pub project_id: String,
    pub display_name: String,
    pub state: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListFoldersResponse {
    folders: Vec<Folder>,
    next_page_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListProjectsResponse {
    projects: Vec<Project>,
    next_page_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetIamPolicyRequest {
    options: GetPolicyOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetPolicyOptions {
    requested_policy_version: i32,
}

#[derive(Clone)]
pub struct ResourceManagerClient {
    inner: AuthorizedClient,
    base_url: String,
}

impl ResourceManagerClient {
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

    /// Gets one organization by numeric id.
    pub async fn get_organization(
        &self,
        org_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Organization, Error> {
        let url = format!("{}/organizations/{org_id}", self.base_url);
        invoke(cancel, None, || self.inner.send(self.inner.http().get(&url))).await
    }

    /// Lists folders whose direct parent is `parent`, following pages. Each
    /// page fetch is individually retried.
    pub async fn list_folders(
        &self,
        parent: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Folder>, Error> {
        let url = format!("{}/folders", self.base_url);
        let mut folders = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListFoldersResponse = invoke_fn(
                cancel.clone(),
                None,
                |token: String| {
                    let url = url.clone();
                    async move {
                        let mut request = self
                            .inner
                            .http()
                            .get(&url)
                            .query(&[("parent", parent), ("pageSize", PAGE_SIZE)]);
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
            folders.extend(response.folders);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(folders);
            }
        }
    }

    /// Lists projects whose direct parent is `parent`, following pages.
    pub async fn list_projects(
        &self,
        parent: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Project>, Error> {
        let url = format!("{}/projects", self.base_url);
        let mut projects = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListProjectsResponse = invoke_fn(
                cancel.clone(),
                None,
                |token: String| {
                    let url = url.clone();
                    async move {
                        let mut request = self
                            .inner
                            .http()
                            .get(&url)
                            .query(&[("parent", parent), ("pageSize", PAGE_SIZE)]);
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
            projects.extend(response.projects);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(projects);
            }
        }
    }

    /// Fetches the allow policy at a container (`organizations/…`,
    /// `folders/…`, `projects/…`) with requested policy version 3.
    pub async fn get_iam_policy(
        &self,
        resource: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Policy, Error> {
        let url = format!("{}/{resource}:getIamPolicy", self.base_url);
        let body = GetIamPolicyRequest {
            options: GetPolicyOptions {
                requested_policy_version: 3,
            },
        };
        invoke(cancel, None, || {
            self.inner.send(self.inner.http().post(&url).json(&body))
        })
        .await
    }
}
