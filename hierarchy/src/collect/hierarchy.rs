//! Container tree collection: organizations, folders, projects, and the
//! allow and deny policies attached to each.
//!
//! Failure to fetch the organization itself or to list children is fatal;
//! per-container policy fetches degrade to warnings with empty policies.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::http::iam::{DenyPolicyResource, IamClient};
use crate::http::resourcemanager::{Folder as ApiFolder, ResourceManagerClient};
use crate::http::{CancellationToken, Error};
use crate::model::{DenyPolicy, DenyRule, Folder, Hierarchy, Organization, Policies, Project};
use crate::uri;

pub struct HierarchyCollector {
    crm: ResourceManagerClient,
    iam: IamClient,
    collect_deny: bool,
    deny_page_interval: Duration,
}

impl HierarchyCollector {
    pub fn new(
        crm: ResourceManagerClient,
        iam: IamClient,
        collect_deny: bool,
        deny_page_interval: Duration,
    ) -> Self {
        Self {
            crm,
            iam,
            collect_deny,
            deny_page_interval,
        }
    }

    pub async fn collect(
        &self,
        org_id: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Hierarchy, Error> {
        let org = self.crm.get_organization(org_id, cancel.clone()).await?;
        tracing::debug!(org = %org.name, "collecting hierarchy");
        let policies = self.container_policies(&org.name, cancel.clone()).await;
        let (folders, projects) = self.collect_children(&org.name, cancel).await?;
        Ok(Hierarchy {
            organizations: vec![Organization {
                name: org.name,
                display_name: org.display_name,
                policies,
                folders,
                projects,
            }],
        })
    }

    fn collect_folder<'a>(
        &'a self,
        folder: ApiFolder,
        cancel: Option<CancellationToken>,
    ) -> BoxFuture<'a, Result<Folder, Error>> {
        async move {
            let policies = self.container_policies(&folder.name, cancel.clone()).await;
            let (folders, projects) = self.collect_children(&folder.name, cancel).await?;
            Ok(Folder {
                name: folder.name,
                display_name: folder.display_name,
                parent: folder.parent,
                policies,
                folders,
                projects,
            })
        }
        .boxed()
    }

    async fn collect_children(
        &self,
        parent: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<(Vec<Folder>, Vec<Project>), Error> {
        let mut folders = Vec::new();
        for api_folder in self.crm.list_folders(parent, cancel.clone()).await? {
            folders.push(self.collect_folder(api_folder, cancel.clone()).await?);
        }
        let mut projects = Vec::new();
        for api_project in self.crm.list_projects(parent, cancel.clone()).await? {
            let policies = self
                .container_policies(&api_project.name, cancel.clone())
                .await;
            projects.push(Project {
                name: api_project.name,
                project_id: api_project.project_id,
                parent: api_project.parent,
                display_name: api_project.display_name,
                policies,
            });
        }
        Ok((folders, projects))
    }

    /// Allow plus deny policies for one container; each fetch degrades to a
    /// warning independently.
    async fn container_policies(&self, name: &str, cancel: Option<CancellationToken>) -> Policies {
        let allow = match self.crm.get_iam_policy(name, cancel.clone()).await {
            Ok(mut policy) => {
                policy.resource_uri = uri::container_uri(name);
                Some(policy)
            }
            Err(e) => {
                tracing::warn!(container = name, "failed to fetch allow policy: {e}");
                None
            }
        };
        let deny = if self.collect_deny {
            self.deny_policies(name, cancel).await
        } else {
            Vec::new()
        };
        Policies { allow, deny }
    }

    async fn deny_policies(&self, name: &str, cancel: Option<CancellationToken>) -> Vec<DenyPolicy> {
        let attachment_point = format!("{}/{name}", uri::CRM);
        let mut policies = Vec::new();
        let mut page_token = String::new();
        loop {
            let page = match self
                .iam
                .list_deny_policies_page(&attachment_point, &page_token, cancel.clone())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(container = name, "failed to list deny policies: {e}");
                    return Vec::new();
                }
            };
            policies.extend(page.policies.into_iter().map(convert_deny_policy));
            page_token = page.next_page_token;
            if page_token.is_empty() {
                return policies;
            }
            // Deny-policy listing is tightly quota-limited; pace the pages.
            tokio::time::sleep(self.deny_page_interval).await;
        }
    }
}

fn convert_deny_policy(policy: DenyPolicyResource) -> DenyPolicy {
    DenyPolicy {
        name: policy.name,
        etag: policy.etag,
        rules: policy
            .rules
            .into_iter()
            .filter_map(|rule| rule.deny_rule)
            .map(|body| DenyRule {
                denied_principals: body.denied_principals,
                denied_permissions: body.denied_permissions,
                exception_principals: body.exception_principals,
                condition: body.denial_condition,
            })
            .collect(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::http::iam::{DenyRuleBody, PolicyRule};

    #[test]
    fn deny_conversion_drops_ruleless_entries() {
        let converted = convert_deny_policy(DenyPolicyResource {
            name: "policies/x/denypolicies/d1".to_string(),
            etag: "abc".to_string(),
            rules: vec![
                PolicyRule {
                    description: "no body".to_string(),
                    deny_rule: None,
                },
                PolicyRule {
                    description: String::new(),
                    deny_rule: Some(DenyRuleBody {
                        denied_principals: vec!["principal://goog/subject/bob".to_string()],
                        denied_permissions: vec!["iam.googleapis.com/serviceAccounts.actAs".to_string()],
                        exception_principals: vec![],
                        exception_permissions: vec![],
                        denial_condition: None,
                    }),
                },
            ],
        });
        assert_eq!(converted.rules.len(), 1);
        assert_eq!(converted.rules[0].denied_permissions.len(), 1);
    }
}
