//! Principal-access-boundary collection: policies at the organization,
//! bindings at every container. All failures degrade to empty sets.

use crate::http::iam::{IamClient, PabPolicyResource, PolicyBinding};
use crate::http::CancellationToken;
use crate::model::{PabBinding, PabPolicy, PabRule, PabState};
use crate::uri;

const PAB_POLICY_KIND: &str = "PRINCIPAL_ACCESS_BOUNDARY";

pub struct PabCollector {
    client: IamClient,
}

impl PabCollector {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }

    /// `containers` are the short names (`organizations/…`, `folders/…`,
    /// `projects/…`) whose policy bindings should be walked.
    pub async fn collect(
        &self,
        org_id: &str,
        containers: &[String],
        cancel: Option<CancellationToken>,
    ) -> PabState {
        let policies = match self.client.list_pab_policies(org_id, cancel.clone()).await {
            Ok(policies) => policies.into_iter().map(convert_policy).collect(),
            Err(e) => {
                tracing::warn!(org_id, "failed to list PAB policies: {e}");
                Vec::new()
            }
        };

        let mut bindings = Vec::new();
        for container in containers {
            match self.client.list_policy_bindings(container, cancel.clone()).await {
                Ok(container_bindings) => {
                    let parent_uri = uri::container_uri(container);
                    bindings.extend(
                        container_bindings
                            .into_iter()
                            .filter(|b| b.policy_kind == PAB_POLICY_KIND)
                            .map(|b| convert_binding(b, &parent_uri)),
                    );
                }
                Err(e) => {
                    tracing::warn!(container = %container, "failed to list policy bindings: {e}");
                }
            }
        }

        PabState { policies, bindings }
    }
}

fn convert_policy(policy: PabPolicyResource) -> PabPolicy {
    PabPolicy {
        name: policy.name,
        display_name: policy.display_name,
        rules: policy
            .details
            .rules
            .into_iter()
            .map(|r| PabRule {
                resources: r.resources,
            })
            .collect(),
    }
}

fn convert_binding(binding: PolicyBinding, parent_uri: &str) -> PabBinding {
    PabBinding {
        policy: binding.policy,
        principal_set: binding.target.principal_set,
        parent_uri: parent_uri.to_string(),
        condition: binding.condition,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::http::iam::{BindingTarget, PabPolicyDetails, PabRuleResource};

    #[test]
    fn policy_conversion_keeps_rule_resources() {
        let converted = convert_policy(PabPolicyResource {
            name: "organizations/111/locations/global/principalAccessBoundaryPolicies/p".to_string(),
            display_name: "p".to_string(),
            details: PabPolicyDetails {
                rules: vec![PabRuleResource {
                    description: String::new(),
                    resources: vec!["storage".to_string(), "iam.serviceAccounts.actAs".to_string()],
                    effect: "ALLOW".to_string(),
                }],
            },
        });
        assert_eq!(converted.rules.len(), 1);
        assert_eq!(converted.rules[0].resources.len(), 2);
    }

    #[test]
    fn binding_conversion_records_host_container() {
        let converted = convert_binding(
            PolicyBinding {
                name: "projects/222/locations/global/policyBindings/b".to_string(),
                policy: "organizations/111/locations/global/principalAccessBoundaryPolicies/p"
                    .to_string(),
                policy_kind: "PRINCIPAL_ACCESS_BOUNDARY".to_string(),
                target: BindingTarget {
                    principal_set: "user:alice@example.com".to_string(),
                },
                condition: None,
            },
            "//cloudresourcemanager.googleapis.com/projects/222",
        );
        assert_eq!(converted.parent_uri, "//cloudresourcemanager.googleapis.com/projects/222");
        assert_eq!(converted.principal_set, "user:alice@example.com");
    }
}
