//! End-to-end tests of the analyze pipeline over in-memory collected state.

use std::collections::BTreeSet;

use iamgraph_hierarchy::config::{Mode, ProcessorConfig};
use iamgraph_hierarchy::model::{
    asset, prop, Binding, Condition, DenyPolicy, DenyRule, Hierarchy, Organization, PabBinding,
    PabPolicy, PabRule, PabState, Policies, Policy, Project, Resource, Role,
};
use iamgraph_hierarchy::store::{CollectedState, Metadata, OfflineStore};
use iamgraph_hierarchy::HierarchyProcessor;

const ORG_URI: &str = "//cloudresourcemanager.googleapis.com/organizations/111";
const PROJECT_URI: &str = "//cloudresourcemanager.googleapis.com/projects/222";

fn config() -> ProcessorConfig {
    ProcessorConfig::new(Mode::OfflineAnalyze, "111")
}

fn binding(role: &str, members: &[&str]) -> Binding {
    Binding {
        role: role.to_string(),
        members: members.iter().map(|m| m.to_string()).collect(),
        condition: None,
    }
}

fn allow(bindings: Vec<Binding>) -> Policies {
    Policies {
        allow: Some(Policy {
            version: 3,
            etag: "etag".to_string(),
            bindings,
            resource_uri: String::new(),
        }),
        deny: vec![],
    }
}

fn hierarchy(org_policies: Policies, project_policies: Policies) -> Hierarchy {
    Hierarchy {
        organizations: vec![Organization {
            name: "organizations/111".to_string(),
            display_name: "example.com".to_string(),
            policies: org_policies,
            folders: vec![],
            projects: vec![Project {
                name: "projects/222".to_string(),
                project_id: "p-alpha".to_string(),
                parent: "organizations/111".to_string(),
                display_name: "alpha".to_string(),
                policies: project_policies,
            }],
        }],
    }
}

fn storage_admin_role() -> Role {
    Role {
        name: "roles/storage.admin".to_string(),
        stage: "GA".to_string(),
        parent_uri: String::new(),
        included_permissions: vec![
            "storage.objects.create".to_string(),
            "storage.objects.setIamPolicy".to_string(),
            "storage.objects.delete".to_string(),
            "storage.hmacKeys.create".to_string(),
            // non-privesc extras that must be suppressed
            "storage.objects.get".to_string(),
            "storage.buckets.list".to_string(),
        ],
    }
}

fn service_account_user_role() -> Role {
    Role {
        name: "roles/iam.serviceAccountUser".to_string(),
        stage: "GA".to_string(),
        parent_uri: String::new(),
        included_permissions: vec![
            "iam.serviceAccounts.actAs".to_string(),
            "iam.serviceAccounts.list".to_string(),
        ],
    }
}

fn service_account(email: &str) -> Resource {
    let mut resource = Resource::new(
        asset::SERVICE_ACCOUNT,
        format!("//iam.googleapis.com/projects/222/serviceAccounts/{email}"),
    );
    resource.parent_uri = PROJECT_URI.to_string();
    resource.display_name = email.to_string();
    resource.set_property(prop::EMAIL, email);
    resource.set_property(prop::PROJECT_NUMBER, "222");
    resource
}

fn state(
    org_policies: Policies,
    project_policies: Policies,
    roles: Vec<Role>,
    resources: Vec<Resource>,
) -> CollectedState {
    CollectedState {
        metadata: Metadata::default(),
        hierarchy: hierarchy(org_policies, project_policies),
        roles,
        pab: PabState::default(),
        resources,
    }
}

#[test]
fn org_level_admin_binding_fans_out_to_the_project() {
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        allow(vec![binding("roles/storage.admin", &["user:alice@example.com"])]),
        Policies::default(),
        vec![storage_admin_role()],
        vec![],
    ));

    assert_eq!(output.tuples.len(), 4);
    for tuple in &output.tuples {
        assert_eq!(tuple.source.uri, "user:alice@example.com");
        assert_eq!(tuple.target.uri, PROJECT_URI);
        assert_eq!(tuple.provenance.via_containers, vec![ORG_URI.to_string()]);
        assert_eq!(tuple.provenance.via_roles, vec!["roles/storage.admin".to_string()]);
        assert!(!tuple.provenance.conditional);
        assert!(!tuple.is_deny);
    }
    let permissions: BTreeSet<&str> = output.tuples.iter().map(|t| t.permission.as_str()).collect();
    assert_eq!(
        permissions,
        BTreeSet::from([
            "storage.objects.create",
            "storage.objects.setIamPolicy",
            "storage.objects.delete",
            "storage.hmacKeys.create",
        ])
    );

    // The org still contains the project.
    assert!(output
        .edges
        .iter()
        .any(|e| e.parent.uri == ORG_URI && e.child.uri == PROJECT_URI));
}

#[test]
fn deny_rule_emits_a_single_deny_tuple() {
    let project_policies = Policies {
        allow: None,
        deny: vec![DenyPolicy {
            name: "policies/deny-actas".to_string(),
            etag: "e".to_string(),
            rules: vec![DenyRule {
                denied_principals: vec!["user:bob@example.com".to_string()],
                denied_permissions: vec!["iam.serviceAccounts.actAs".to_string()],
                exception_principals: vec![],
                condition: None,
            }],
        }],
    };
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        Policies::default(),
        project_policies,
        vec![],
        vec![],
    ));

    assert_eq!(output.tuples.len(), 1);
    let tuple = &output.tuples[0];
    assert!(tuple.is_deny);
    assert_eq!(tuple.permission, "iam.serviceAccounts.actAs");
    assert_eq!(tuple.source.uri, "user:bob@example.com");
    assert_eq!(tuple.target.uri, PROJECT_URI);
    assert_eq!(tuple.provenance.via_containers, vec![PROJECT_URI.to_string()]);
}

#[test]
fn principal_set_expands_to_collected_service_accounts() {
    let member = "principalSet://cloudresourcemanager.googleapis.com/projects/222/type/ServiceAccount";
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        Policies::default(),
        allow(vec![binding("roles/iam.serviceAccountUser", &[member])]),
        vec![service_account_user_role()],
        vec![
            service_account("sa1@p-alpha.iam.gserviceaccount.com"),
            service_account("sa2@p-alpha.iam.gserviceaccount.com"),
        ],
    ));

    assert_eq!(output.tuples.len(), 2);
    let sources: BTreeSet<&str> = output.tuples.iter().map(|t| t.source.uri.as_str()).collect();
    assert_eq!(
        sources,
        BTreeSet::from([
            "//iam.googleapis.com/projects/222/serviceAccounts/sa1@p-alpha.iam.gserviceaccount.com",
            "//iam.googleapis.com/projects/222/serviceAccounts/sa2@p-alpha.iam.gserviceaccount.com",
        ])
    );
    for tuple in &output.tuples {
        assert_eq!(tuple.permission, "iam.serviceAccounts.actAs");
        assert_eq!(tuple.provenance.via_roles, vec!["roles/iam.serviceAccountUser".to_string()]);
    }
}

#[test]
fn google_managed_service_account_is_synthesized_under_its_project() {
    let agent = "serviceAccount:service-222@gcp-sa-cloudbuild.iam.gserviceaccount.com";
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        Policies::default(),
        allow(vec![binding("roles/iam.serviceAccountUser", &[agent])]),
        vec![service_account_user_role()],
        vec![],
    ));

    let synthesized = processor
        .registry()
        .service_account_by_email("service-222@gcp-sa-cloudbuild.iam.gserviceaccount.com")
        .expect("agent must be synthesized");
    assert_eq!(synthesized.parent_uri, PROJECT_URI);
    assert_eq!(synthesized.property(prop::GOOGLE_MANAGED), Some("true"));
    assert_eq!(synthesized.property(prop::PROJECT_NUMBER), Some("222"));

    assert!(output
        .edges
        .iter()
        .any(|e| e.parent.uri == PROJECT_URI && e.child.uri == synthesized.uri));

    // The binding resolves to the synthesized agent, not a stub.
    assert_eq!(output.tuples.len(), 1);
    assert_eq!(output.tuples[0].source.uri, synthesized.uri);
}

#[test]
fn uncollected_service_account_gets_exactly_one_stub() {
    let ghost = "serviceAccount:ghost@p-alpha.iam.gserviceaccount.com";
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        allow(vec![binding("roles/iam.serviceAccountUser", &[ghost])]),
        allow(vec![binding("roles/iam.serviceAccountUser", &[ghost])]),
        vec![service_account_user_role()],
        vec![],
    ));

    // One stub despite two bindings referencing the email.
    let stubs: Vec<_> = processor
        .registry()
        .of_type(asset::SERVICE_ACCOUNT)
        .into_iter()
        .filter(|r| {
            r.uri
                .starts_with("//iam.googleapis.com/projects/UNKNOWN/serviceAccounts/")
        })
        .collect();
    assert_eq!(stubs.len(), 1);
    assert_eq!(
        stubs[0].uri,
        "//iam.googleapis.com/projects/UNKNOWN/serviceAccounts/ghost@p-alpha.iam.gserviceaccount.com"
    );
    assert_eq!(output.tuples.len(), 2);
}

#[test]
fn unknown_role_skips_the_binding() {
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        allow(vec![
            binding("roles/never.registered", &["user:alice@example.com"]),
            binding("roles/storage.admin", &["user:alice@example.com"]),
        ]),
        Policies::default(),
        vec![storage_admin_role()],
        vec![],
    ));
    // Only the registered role's privesc permissions survive.
    assert_eq!(output.tuples.len(), 4);
}

#[test]
fn container_without_policies_contributes_only_edges() {
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(Policies::default(), Policies::default(), vec![], vec![]));
    assert!(output.tuples.is_empty());
    assert_eq!(output.edges.len(), 1);
    assert_eq!(output.edges[0].parent.uri, ORG_URI);
    assert_eq!(output.edges[0].child.uri, PROJECT_URI);
}

#[test]
fn conditional_bindings_carry_their_expression() {
    let mut bound = binding("roles/storage.admin", &["user:alice@example.com"]);
    bound.condition = Some(Condition {
        title: "weekdays".to_string(),
        description: String::new(),
        expression: "request.time < timestamp('2027-01-01T00:00:00Z')".to_string(),
    });
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        allow(vec![bound]),
        Policies::default(),
        vec![storage_admin_role()],
        vec![],
    ));
    assert_eq!(output.tuples.len(), 4);
    for tuple in &output.tuples {
        assert!(tuple.provenance.conditional);
        assert_eq!(
            tuple.provenance.conditions,
            vec!["request.time < timestamp('2027-01-01T00:00:00Z')".to_string()]
        );
    }
}

#[test]
fn pab_mask_caps_a_principals_permissions() {
    let pab = PabState {
        policies: vec![PabPolicy {
            name: "organizations/111/locations/global/principalAccessBoundaryPolicies/storage-only"
                .to_string(),
            display_name: String::new(),
            rules: vec![PabRule {
                resources: vec!["storage".to_string()],
            }],
        }],
        bindings: vec![PabBinding {
            policy: "organizations/111/locations/global/principalAccessBoundaryPolicies/storage-only"
                .to_string(),
            principal_set: "user:alice@example.com".to_string(),
            parent_uri: ORG_URI.to_string(),
            condition: None,
        }],
    };
    let mut collected = state(
        allow(vec![
            binding("roles/storage.admin", &["user:alice@example.com"]),
            binding("roles/iam.serviceAccountUser", &["user:alice@example.com"]),
        ]),
        Policies::default(),
        vec![storage_admin_role(), service_account_user_role()],
        vec![],
    );
    collected.pab = pab;

    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(collected);

    // actAs would normally pass privesc filtering, but the mask caps alice
    // to the storage service.
    assert_eq!(output.tuples.len(), 4);
    assert!(output.tuples.iter().all(|t| t.permission.starts_with("storage.")));
}

#[test]
fn basic_role_convenience_member_expands_to_tracked_members() {
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        Policies::default(),
        allow(vec![
            binding("roles/owner", &["user:carol@example.com"]),
            binding("roles/iam.serviceAccountUser", &["projectOwner:p-alpha"]),
        ]),
        vec![service_account_user_role()],
        vec![],
    ));

    assert_eq!(output.tuples.len(), 1);
    assert_eq!(output.tuples[0].source.uri, "user:carol@example.com");
    assert_eq!(output.tuples[0].permission, "iam.serviceAccounts.actAs");
}

#[test]
fn kubernetes_service_account_member_synthesizes_workload_identity() {
    let ksa = "serviceAccount:p-alpha.svc.id.goog[prod/deployer]";
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        Policies::default(),
        allow(vec![binding("roles/iam.serviceAccountUser", &[ksa])]),
        vec![service_account_user_role()],
        vec![],
    ));

    assert_eq!(output.tuples.len(), 1);
    let source = &output.tuples[0].source;
    assert_eq!(source.asset_type, asset::WORKLOAD_IDENTITY);
    assert_eq!(source.uri, ksa);
    assert_eq!(source.parent_uri, PROJECT_URI);
}

#[test]
fn every_tuple_endpoint_is_registered() {
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        allow(vec![
            binding("roles/storage.admin", &["user:alice@example.com", "group:devs@example.com"]),
            binding("roles/iam.serviceAccountUser", &["allUsers", "domain:example.com"]),
        ]),
        allow(vec![binding(
            "roles/iam.serviceAccountUser",
            &["serviceAccount:ghost@p-alpha.iam.gserviceaccount.com"],
        )]),
        vec![storage_admin_role(), service_account_user_role()],
        vec![service_account("sa1@p-alpha.iam.gserviceaccount.com")],
    ));

    for tuple in &output.tuples {
        assert!(processor.registry().contains(&tuple.source.uri), "{}", tuple.source.uri);
        assert!(processor.registry().contains(&tuple.target.uri), "{}", tuple.target.uri);
    }
    for edge in &output.edges {
        assert_eq!(edge.parent.uri, edge.child.parent_uri);
    }
}

fn hierarchy_with_folder(org_policies: Policies) -> Hierarchy {
    Hierarchy {
        organizations: vec![Organization {
            name: "organizations/111".to_string(),
            display_name: "example.com".to_string(),
            policies: org_policies,
            folders: vec![iamgraph_hierarchy::model::Folder {
                name: "folders/1".to_string(),
                display_name: "eng".to_string(),
                parent: "organizations/111".to_string(),
                policies: Policies::default(),
                folders: vec![],
                projects: vec![Project {
                    name: "projects/222".to_string(),
                    project_id: "p-alpha".to_string(),
                    parent: "folders/1".to_string(),
                    display_name: "alpha".to_string(),
                    policies: Policies::default(),
                }],
            }],
            projects: vec![],
        }],
    }
}

#[test]
fn folder_level_principal_set_expands_through_the_ancestor_chain() {
    let member = "principalSet://cloudresourcemanager.googleapis.com/folders/1/type/ServiceAccount";
    let mut collected = state(Policies::default(), Policies::default(), vec![], vec![]);
    collected.hierarchy =
        hierarchy_with_folder(allow(vec![binding("roles/iam.serviceAccountUser", &[member])]));
    collected.roles = vec![service_account_user_role()];
    collected.resources = vec![service_account("sa1@p-alpha.iam.gserviceaccount.com")];

    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(collected);

    assert_eq!(output.tuples.len(), 1);
    assert_eq!(
        output.tuples[0].source.uri,
        "//iam.googleapis.com/projects/222/serviceAccounts/sa1@p-alpha.iam.gserviceaccount.com"
    );
    assert_eq!(output.tuples[0].target.uri, PROJECT_URI);
    // Org contains folder, folder contains project, project contains the SA.
    assert_eq!(output.edges.len(), 3);
}

#[test]
fn workforce_identity_member_synthesizes_a_federated_leaf() {
    let member = "principal://iam.googleapis.com/locations/global/workforcePools/pool-1/subject/alice";
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        Policies::default(),
        allow(vec![binding("roles/iam.serviceAccountUser", &[member])]),
        vec![service_account_user_role()],
        vec![],
    ));

    assert_eq!(output.tuples.len(), 1);
    let source = &output.tuples[0].source;
    assert_eq!(source.asset_type, asset::WORKFORCE_IDENTITY);
    assert_eq!(source.uri, member);
    assert_eq!(source.display_name, "alice");
}

#[test]
fn workload_pool_member_is_parented_at_its_project() {
    let member = "principal://iam.googleapis.com/projects/222/locations/global/workloadIdentityPools/pool-2/subject/repo";
    let mut processor = HierarchyProcessor::new(config());
    let output = processor.analyze(state(
        Policies::default(),
        allow(vec![binding("roles/iam.serviceAccountUser", &[member])]),
        vec![service_account_user_role()],
        vec![],
    ));

    assert_eq!(output.tuples.len(), 1);
    let source = &output.tuples[0].source;
    assert_eq!(source.asset_type, asset::WORKLOAD_IDENTITY);
    assert_eq!(source.parent_uri, PROJECT_URI);
}

#[test]
fn offline_round_trip_reproduces_the_analysis() {
    let collected = state(
        allow(vec![
            binding("roles/storage.admin", &["user:alice@example.com"]),
            binding("roles/iam.serviceAccountUser", &[
                "principalSet://cloudresourcemanager.googleapis.com/projects/222/type/ServiceAccount",
            ]),
        ]),
        allow(vec![binding("roles/iam.serviceAccountUser", &["projectOwner:p-alpha"])]),
        vec![storage_admin_role(), service_account_user_role()],
        vec![
            service_account("sa1@p-alpha.iam.gserviceaccount.com"),
            service_account("sa2@p-alpha.iam.gserviceaccount.com"),
        ],
    );

    let dir = tempfile::tempdir().unwrap();
    OfflineStore::new(dir.path()).save(&collected).unwrap();
    let reloaded = OfflineStore::new(dir.path()).load().unwrap();

    let direct = HierarchyProcessor::new(config()).analyze(collected);
    let replayed = HierarchyProcessor::new(config()).analyze(reloaded);

    let project = |output: &iamgraph_hierarchy::AnalysisOutput| {
        (
            output
                .tuples
                .iter()
                .map(|t| {
                    (
                        t.source.uri.clone(),
                        t.permission.clone(),
                        t.target.uri.clone(),
                        t.is_deny,
                    )
                })
                .collect::<Vec<_>>(),
            output
                .edges
                .iter()
                .map(|e| (e.parent.uri.clone(), e.child.uri.clone()))
                .collect::<Vec<_>>(),
        )
    };
    assert_eq!(project(&direct), project(&replayed));
}
