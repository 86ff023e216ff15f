//! IAM surfaces: roles (v1), service accounts (v1), deny policies (v2),
//! and principal-access-boundary policies plus bindings (v3).

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use token_source::TokenSource;

use iamgraph_gax::retry::{invoke, invoke_fn};

use crate::http::{AuthorizedClient, CancellationToken, Error};
use crate::model::{Condition, Policy};

const BASE_URL: &str = "https://iam.googleapis.com";
const ROLE_PAGE_SIZE: &str = "1000";

/// Attachment points (`cloudresourcemanager.googleapis.com/projects/123`)
/// must be URL-escaped into a single path segment.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'*').remove(b'-').remove(b'.').remove(b'_');

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiRole {
    /// `roles/…`, `organizations/…/roles/…`, or `projects/…/roles/…`.
    pub name: String,
    pub title: String,
    pub stage: String,
    pub included_permissions: Vec<String>,
    pub deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListRolesResponse {
    roles: Vec<ApiRole>,
    next_page_token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceAccount {
    /// `projects/{projectId}/serviceAccounts/{email}`.
    pub name: String,
    pub project_id: String,
    pub unique_id: String,
    pub email: String,
    pub display_name: String,
    pub disabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListServiceAccountsResponse {
    accounts: Vec<ServiceAccount>,
    next_page_token: String,
}

/// One policy from the v2 deny-policy listing.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DenyPolicyResource {
    pub name: String,
    pub etag: String,
    pub rules: Vec<PolicyRule>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyRule {
    pub description: String,
    pub deny_rule: Option<DenyRuleBody>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DenyRuleBody {
    pub denied_principals: Vec<String>,
    pub denied_permissions: Vec<String>,
    pub exception_principals: Vec<String>,
    pub exception_permissions: Vec<String>,
    pub denial_condition: Option<Condition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListDenyPoliciesResponse {
    pub policies: Vec<DenyPolicyResource>,
    pub next_page_token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PabPolicyResource {
    pub name: String,
    pub display_name: String,
    pub details: PabPolicyDetails,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PabPolicyDetails {
    pub rules: Vec<PabRuleResource>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PabRuleResource {
    pub description: String,
    pub resources: Vec<String>,
    pub effect: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListPabPoliciesResponse {
    principal_access_boundary_policies: Vec<PabPolicyResource>,
    next_page_token: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyBinding {
    pub name: String,
    /// Name of the bound policy.
    pub policy: String,
    pub policy_kind: String,
    pub target: BindingTarget,
    pub condition: Option<Condition>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BindingTarget {
    pub principal_set: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListPolicyBindingsResponse {
    policy_bindings: Vec<PolicyBinding>,
    next_page_token: String,
}

#[derive(Clone)]
pub struct IamClient {
    inner: AuthorizedClient,
    base_url: String,
}

impl IamClient {
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

    /// Lists roles with view `FULL`, following pages. `parent` of `None`
    /// lists the predefined roles; `Some("organizations/…")` or
    /// `Some("projects/…")` lists that container's custom roles.
    pub async fn list_roles(
        &self,
        parent: Option<&str>,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<ApiRole>, Error> {
        let url = match parent {
            Some(parent) => format!("{}/v1/{parent}/roles", self.base_url),
            None => format!("{}/v1/roles", self.base_url),
        };
        let mut roles = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListRolesResponse = invoke_fn(
                cancel.clone(),
                None,
                |token: String| {
                    let url = url.clone();
                    async move {
                        let mut request = self
                            .inner
                            .http()
                            .get(&url)
                            .query(&[("view", "FULL"), ("pageSize", ROLE_PAGE_SIZE)]);
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
            roles.extend(response.roles);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(roles);
            }
        }
    }

    /// Lists service accounts in a project, following pages.
    pub async fn list_service_accounts(
        &self,
        project_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<ServiceAccount>, Error> {
        let url = format!("{}/v1/projects/{project_id}/serviceAccounts", self.base_url);
        let mut accounts = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListServiceAccountsResponse = invoke_fn(
                cancel.clone(),
                None,
                |token: String| {
                    let url = url.clone();
                    async move {
                        let mut request = self.inner.http().get(&url).query(&[("pageSize", "100")]);
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
            accounts.extend(response.accounts);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(accounts);
            }
        }
    }

    /// Fetches the allow policy of one service account (who may act as it).
    pub async fn get_service_account_iam_policy(
        &self,
        project_id: &str,
        email: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Policy, Error> {
        let url = format!(
            "{}/v1/projects/{project_id}/serviceAccounts/{email}:getIamPolicy",
            self.base_url
        );
        invoke(cancel, None, || {
            self.inner.send(
                self.inner
                    .http()
                    .post(&url)
                    .query(&[("options.requestedPolicyVersion", "3")]),
            )
        })
        .await
    }

    /// One page of the deny policies attached at `attachment_point`
    /// (`cloudresourcemanager.googleapis.com/projects/123`). The caller owns
    /// page pacing; the page fetch itself is retried.
    pub async fn list_deny_policies_page(
        &self,
        attachment_point: &str,
        page_token: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<ListDenyPoliciesResponse, Error> {
        let encoded = utf8_percent_encode(attachment_point, ENCODE_SET).to_string();
        let url = format!("{}/v2/policies/{encoded}/denypolicies", self.base_url);
        invoke_fn(
            cancel,
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
            page_token.to_string(),
        )
        .await
    }

    /// Lists the organization's principal-access-boundary policies.
    pub async fn list_pab_policies(
        &self,
        org_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<PabPolicyResource>, Error> {
        let url = format!(
            "{}/v3/organizations/{org_id}/locations/global/principalAccessBoundaryPolicies",
            self.base_url
        );
        let mut policies = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListPabPoliciesResponse = invoke_fn(
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
            policies.extend(response.principal_access_boundary_policies);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(policies);
            }
        }
    }

    /// Lists the policy bindings hosted at one container
    /// (`organizations/…`, `folders/…`, `projects/…`), all kinds.
    pub async fn list_policy_bindings(
        &self,
        container: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<PolicyBinding>, Error> {
        let url = format!(
            "{}/v3/{container}/locations/global/policyBindings",
            self.base_url
        );
        let mut bindings = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListPolicyBindingsResponse = invoke_fn(
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
            bindings.extend(response.policy_bindings);
            page_token = response.next_page_token;
            if page_token.is_empty() {
                return Ok(bindings);
            }
        }
    }
}
