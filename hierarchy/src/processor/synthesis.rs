//! Google-managed service-account synthesis: agents referenced by bindings
//! but never collected are materialized under their owning project, found
//! through the project number encoded in the agent email.

use std::collections::BTreeSet;

use crate::model::{asset, prop, Resource};
use crate::output::ContainsEdge;
use crate::uri;

use super::HierarchyProcessor;

/// Project number of a Google-managed service agent email, if the email
/// matches one of the known agent shapes.
pub(crate) fn google_managed_project_number(email: &str) -> Option<String> {
    let (username, domain) = email.split_once('@')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if (domain == "cloudbuild.gserviceaccount.com" || domain == "cloudservices.gserviceaccount.com")
        && all_digits(username)
    {
        return Some(username.to_string());
    }
    if let Some(digits) = username.strip_prefix("service-") {
        if all_digits(digits) && domain.ends_with(".iam.gserviceaccount.com") {
            return Some(digits.to_string());
        }
    }
    None
}

impl HierarchyProcessor {
    /// Scans pending bindings for `serviceAccount:` members absent from the
    /// email index, synthesizes any Google-managed agents among them under
    /// their owning project, and emits the CONTAINS edge.
    pub(crate) fn synthesize_google_managed(&mut self) {
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        for binding in &self.pending {
            let Some(email) = binding.member.strip_prefix("serviceAccount:") else {
                continue;
            };
            if self.registry.service_account_by_email(email).is_none() {
                candidates.insert(email.to_string());
            }
        }

        for email in candidates {
            let Some(number) = google_managed_project_number(&email) else {
                continue;
            };
            let Some(project_uri) = self.project_uris_by_number.get(&number).cloned() else {
                continue;
            };
            let mut resource = Resource::new(
                asset::SERVICE_ACCOUNT,
                uri::service_account_uri(&number, &email),
            );
            resource.parent_uri = project_uri.clone();
            resource.display_name = email.clone();
            resource.set_property(prop::EMAIL, &email);
            resource.set_property(prop::GOOGLE_MANAGED, "true");
            resource.set_property(prop::PROJECT_NUMBER, &number);
            let arc = self.registry.insert(resource);
            if let Some(parent) = self.registry.get(&project_uri) {
                self.edges.push(ContainsEdge { parent, child: arc });
            }
            tracing::debug!(email = %email, project = %number, "synthesized Google-managed service account");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_cloudbuild_and_cloudservices_agents() {
        assert_eq!(
            google_managed_project_number("222@cloudbuild.gserviceaccount.com").as_deref(),
            Some("222")
        );
        assert_eq!(
            google_managed_project_number("987654@cloudservices.gserviceaccount.com").as_deref(),
            Some("987654")
        );
    }

    #[test]
    fn classifies_service_prefixed_agents() {
        assert_eq!(
            google_managed_project_number("service-222@gcp-sa-cloudbuild.iam.gserviceaccount.com")
                .as_deref(),
            Some("222")
        );
        assert_eq!(
            google_managed_project_number("service-42@compute-system.iam.gserviceaccount.com")
                .as_deref(),
            Some("42")
        );
    }

    #[test]
    fn rejects_user_managed_accounts() {
        assert_eq!(
            google_managed_project_number("app@p-alpha.iam.gserviceaccount.com"),
            None
        );
        assert_eq!(
            google_managed_project_number("service-abc@gcp-sa-x.iam.gserviceaccount.com"),
            None
        );
        assert_eq!(
            google_managed_project_number("222@appspot.gserviceaccount.com"),
            None
        );
        assert_eq!(google_managed_project_number("not-an-email"), None);
    }
}
