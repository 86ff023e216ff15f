//! Principal-access-boundary evaluation: per-principal permission masks.

use std::collections::{BTreeSet, HashMap};

use crate::member::MemberNormalizer;
use crate::model::{PabPolicy, PabState};

/// The upper bound a PAB policy places on one principal set: allowed
/// services plus individually allowed fully-qualified permissions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PabMask {
    services: BTreeSet<String>,
    permissions: BTreeSet<String>,
}

impl PabMask {
    fn from_policy(policy: &PabPolicy) -> Self {
        let mut mask = PabMask::default();
        for rule in &policy.rules {
            for resource in &rule.resources {
                // A rule resource with a dot is a permission, without one a service.
                if resource.contains('.') {
                    mask.permissions.insert(resource.clone());
                } else {
                    mask.services.insert(resource.clone());
                }
            }
        }
        mask
    }

    fn merge(&mut self, other: PabMask) {
        self.services.extend(other.services);
        self.permissions.extend(other.permissions);
    }

    /// A permission passes if the mask allows it literally, or if an allowed
    /// service is its prefix up to and including the first `.`.
    pub fn permits(&self, permission: &str) -> bool {
        if self.permissions.contains(permission) {
            return true;
        }
        match permission.find('.') {
            Some(dot) => self.services.contains(&permission[..dot]),
            None => false,
        }
    }
}

/// Built once after hierarchy and PAB collection; read-only thereafter.
#[derive(Default)]
pub struct PabEvaluator {
    masks: HashMap<String, PabMask>,
}

impl PabEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves each binding's policy by name (bindings to absent policies
    /// are skipped silently) and stores the mask under the normalized
    /// principal-set key, merging masks bound to the same principal.
    pub fn build(state: &PabState, normalizer: &MemberNormalizer) -> Self {
        let by_name: HashMap<&str, &PabPolicy> =
            state.policies.iter().map(|p| (p.name.as_str(), p)).collect();
        let mut masks: HashMap<String, PabMask> = HashMap::new();
        for binding in &state.bindings {
            let Some(policy) = by_name.get(binding.policy.as_str()) else {
                continue;
            };
            let key = normalizer.normalize(&binding.principal_set).key();
            let mask = PabMask::from_policy(policy);
            match masks.get_mut(&key) {
                Some(existing) => existing.merge(mask),
                None => {
                    masks.insert(key, mask);
                }
            }
        }
        Self { masks }
    }

    pub fn mask_for(&self, principal_key: &str) -> Option<&PabMask> {
        self.masks.get(principal_key)
    }

    /// Replaces `permissions` with the subset passing the principal's mask.
    /// Principals without a mask pass through untouched.
    pub fn filter(&self, principal_key: &str, permissions: BTreeSet<String>) -> BTreeSet<String> {
        match self.masks.get(principal_key) {
            Some(mask) => permissions.into_iter().filter(|p| mask.permits(p)).collect(),
            None => permissions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{PabBinding, PabRule};

    fn state() -> PabState {
        PabState {
            policies: vec![PabPolicy {
                name: "organizations/111/locations/global/principalAccessBoundaryPolicies/pab-1"
                    .to_string(),
                display_name: "storage only".to_string(),
                rules: vec![PabRule {
                    resources: vec![
                        "storage".to_string(),
                        "iam.serviceAccounts.actAs".to_string(),
                    ],
                }],
            }],
            bindings: vec![PabBinding {
                policy: "organizations/111/locations/global/principalAccessBoundaryPolicies/pab-1"
                    .to_string(),
                principal_set: "user:alice@example.com".to_string(),
                parent_uri: "//cloudresourcemanager.googleapis.com/organizations/111".to_string(),
                condition: None,
            }],
        }
    }

    #[test]
    fn mask_splits_services_and_permissions() {
        let evaluator = PabEvaluator::build(&state(), &MemberNormalizer::new());
        let mask = evaluator.mask_for("alice@example.com").unwrap();
        assert!(mask.permits("storage.objects.create"));
        assert!(mask.permits("iam.serviceAccounts.actAs"));
        assert!(!mask.permits("iam.serviceAccounts.getAccessToken"));
        assert!(!mask.permits("compute.instances.create"));
    }

    #[test]
    fn binding_to_absent_policy_is_skipped() {
        let mut s = state();
        s.bindings[0].policy = "organizations/111/locations/global/principalAccessBoundaryPolicies/missing".to_string();
        let evaluator = PabEvaluator::build(&s, &MemberNormalizer::new());
        assert!(evaluator.is_empty());
    }

    #[test]
    fn filter_leaves_unmasked_principals_alone() {
        let evaluator = PabEvaluator::build(&state(), &MemberNormalizer::new());
        let perms: BTreeSet<String> = ["compute.instances.create".to_string()].into();
        assert_eq!(evaluator.filter("bob@example.com", perms.clone()), perms);
    }

    #[test]
    fn filter_drops_permissions_outside_the_mask() {
        let evaluator = PabEvaluator::build(&state(), &MemberNormalizer::new());
        let perms: BTreeSet<String> = [
            "storage.objects.create".to_string(),
            "compute.instances.create".to_string(),
        ]
        .into();
        let filtered = evaluator.filter("alice@example.com", perms);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains("storage.objects.create"));
    }

    #[test]
    fn masks_for_the_same_principal_merge() {
        let mut s = state();
        s.policies.push(PabPolicy {
            name: "organizations/111/locations/global/principalAccessBoundaryPolicies/pab-2"
                .to_string(),
            display_name: String::new(),
            rules: vec![PabRule {
                resources: vec!["compute".to_string()],
            }],
        });
        s.bindings.push(PabBinding {
            policy: "organizations/111/locations/global/principalAccessBoundaryPolicies/pab-2"
                .to_string(),
            principal_set: "user:alice@example.com".to_string(),
            parent_uri: String::new(),
            condition: None,
        });
        let evaluator = PabEvaluator::build(&s, &MemberNormalizer::new());
        let mask = evaluator.mask_for("alice@example.com").unwrap();
        assert!(mask.permits("storage.objects.create"));
        assert!(mask.permits("compute.instances.create"));
    }
}
