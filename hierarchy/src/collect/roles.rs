//! Role collection: the predefined role dictionary plus per-container
//! custom roles.

use crate::http::iam::{ApiRole, IamClient};
use crate::http::{CancellationToken, Error};
use crate::model::Role;
use crate::uri;

pub struct RoleCollector {
    client: IamClient,
}

impl RoleCollector {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }

    /// The predefined role dictionary. Failure here is fatal: without it no
    /// binding can be expanded.
    pub async fn collect_predefined(
        &self,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Role>, Error> {
        let roles = self.client.list_roles(None, cancel).await?;
        tracing::debug!(count = roles.len(), "collected predefined roles");
        Ok(roles.into_iter().map(|r| convert_role(r, "")).collect())
    }

    /// Custom roles of one container (`organizations/…` or `projects/…`).
    /// Failures degrade to an empty set.
    pub async fn collect_custom(
        &self,
        parent: &str,
        cancel: Option<CancellationToken>,
    ) -> Vec<Role> {
        match self.client.list_roles(Some(parent), cancel).await {
            Ok(roles) => {
                let parent_uri = uri::container_uri(parent);
                roles
                    .into_iter()
                    .map(|r| convert_role(r, &parent_uri))
                    .collect()
            }
            Err(e) => {
                tracing::warn!(parent, "failed to list custom roles: {e}");
                Vec::new()
            }
        }
    }
}

fn convert_role(role: ApiRole, parent_uri: &str) -> Role {
    Role {
        name: role.name,
        stage: role.stage,
        parent_uri: parent_uri.to_string(),
        included_permissions: role.included_permissions,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn predefined_roles_have_empty_parent() {
        let role = convert_role(
            ApiRole {
                name: "roles/storage.admin".to_string(),
                title: "Storage Admin".to_string(),
                stage: "GA".to_string(),
                included_permissions: vec!["storage.objects.create".to_string()],
                deleted: false,
            },
            "",
        );
        assert!(!role.is_custom());
    }

    #[test]
    fn custom_roles_carry_their_container() {
        let role = convert_role(
            ApiRole {
                name: "projects/p-alpha/roles/deployer".to_string(),
                ..Default::default()
            },
            "//cloudresourcemanager.googleapis.com/projects/222",
        );
        assert!(role.is_custom());
        assert_eq!(role.parent_uri, "//cloudresourcemanager.googleapis.com/projects/222");
    }
}
