//! The closed set of privilege-escalation-relevant permissions.
//!
//! Allow tuples whose permission falls outside this set are suppressed at
//! emission. Deny tuples are never filtered.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;

pub static PRIVESC_PERMISSIONS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        // Resource Manager
        "resourcemanager.organizations.setIamPolicy",
        "resourcemanager.folders.setIamPolicy",
        "resourcemanager.projects.setIamPolicy",
        // IAM: service account impersonation and key material
        "iam.serviceAccounts.setIamPolicy",
        "iam.serviceAccounts.getAccessToken",
        "iam.serviceAccounts.signBlob",
        "iam.serviceAccounts.signJwt",
        "iam.serviceAccounts.implicitDelegation",
        "iam.serviceAccounts.actAs",
        "iam.roles.update",
        "iam.serviceAccountKeys.create",
        // Deployment Manager runs as the cloud-services agent
        "deploymentmanager.deployments.create",
        "deploymentmanager.deployments.update",
        "deploymentmanager.deployments.setIamPolicy",
        // Cloud Build
        "cloudbuild.builds.create",
        "cloudbuild.builds.update",
        // Cloud Functions
        "cloudfunctions.functions.create",
        "cloudfunctions.functions.sourceCodeSet",
        "cloudfunctions.functions.update",
        "cloudfunctions.functions.call",
        "cloudfunctions.functions.setIamPolicy",
        // Compute
        "compute.projects.setCommonInstanceMetadata",
        "compute.instances.create",
        "compute.instances.setMetadata",
        "compute.instances.setServiceAccount",
        "compute.instances.setIamPolicy",
        "compute.instances.osLogin",
        "compute.instances.osAdminLogin",
        "compute.disks.create",
        "compute.subnetworks.use",
        "compute.subnetworks.useExternalIp",
        // Composer environments run as a chosen service account
        "composer.environments.create",
        // GKE workload creation and update
        "container.pods.create",
        "container.pods.update",
        "container.pods.exec",
        "container.pods.portForward",
        "container.deployments.create",
        "container.deployments.update",
        "container.cronJobs.create",
        "container.cronJobs.update",
        "container.daemonSets.create",
        "container.daemonSets.update",
        "container.jobs.create",
        "container.jobs.update",
        "container.replicaSets.create",
        "container.replicaSets.update",
        "container.replicationControllers.create",
        "container.replicationControllers.update",
        "container.statefulSets.create",
        "container.statefulSets.update",
        // GKE secrets and RBAC escalation
        "container.secrets.get",
        "container.secrets.list",
        "container.configMaps.create",
        "container.configMaps.update",
        "container.serviceAccounts.createToken",
        "container.clusterRoles.bind",
        "container.clusterRoles.escalate",
        "container.roles.bind",
        "container.roles.escalate",
        "container.clusterRoleBindings.create",
        "container.clusterRoleBindings.update",
        "container.roleBindings.create",
        "container.roleBindings.update",
        "container.mutatingWebhookConfigurations.create",
        "container.mutatingWebhookConfigurations.update",
        // Cloud Storage
        "storage.hmacKeys.create",
        "storage.objects.create",
        "storage.objects.setIamPolicy",
        "storage.objects.delete",
        // Secret Manager
        "secretmanager.secrets.get",
        "secretmanager.secrets.setIamPolicy",
        // Org policy
        "orgpolicy.policy.set",
        // Cloud Run
        "run.services.create",
        "run.services.setIamPolicy",
        "run.routes.invoke",
        // Cloud Scheduler jobs run as a chosen service account
        "cloudscheduler.jobs.create",
        "cloudscheduler.locations.list",
        // API keys
        "serviceusage.apiKeys.create",
        "serviceusage.apiKeys.list",
        "apikeys.keys.create",
        "apikeys.keys.getKeyString",
        "apikeys.keys.list",
        "apikeys.keys.regenerate",
    ]
    .into_iter()
    .collect()
});

pub fn is_privesc(permission: &str) -> bool {
    PRIVESC_PERMISSIONS.contains(permission)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn membership_spot_checks() {
        assert!(is_privesc("iam.serviceAccounts.actAs"));
        assert!(is_privesc("storage.objects.create"));
        assert!(is_privesc("storage.hmacKeys.create"));
        assert!(is_privesc("resourcemanager.projects.setIamPolicy"));
        assert!(is_privesc("container.clusterRoles.escalate"));
        assert!(!is_privesc("storage.objects.get"));
        assert!(!is_privesc("compute.instances.list"));
        assert!(!is_privesc("iam.serviceAccounts.list"));
    }

    #[test]
    fn set_is_closed_and_nontrivial() {
        assert!(PRIVESC_PERMISSIONS.len() > 80);
        for permission in PRIVESC_PERMISSIONS.iter() {
            assert!(permission.contains('.'), "{permission}");
        }
    }
}
