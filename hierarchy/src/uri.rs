//! Canonical `//{service}/{path}` resource URIs.
//!
//! Short container names (`projects/p-alpha`) are normalized on ingress; the
//! registry only ever holds the full form. Project numbers are authoritative
//! for cross-resource joins, so a `projects/<id>` segment is rewritten to the
//! project number whenever the id→number map knows it.

use std::collections::HashMap;

pub const CRM: &str = "cloudresourcemanager.googleapis.com";
pub const IAM: &str = "iam.googleapis.com";
pub const COMPUTE: &str = "compute.googleapis.com";
pub const STORAGE: &str = "storage.googleapis.com";
pub const RUN: &str = "run.googleapis.com";
pub const FUNCTIONS: &str = "cloudfunctions.googleapis.com";
pub const SECRETMANAGER: &str = "secretmanager.googleapis.com";
pub const DEPLOYMENTMANAGER: &str = "deploymentmanager.googleapis.com";

/// Placeholder project segment for service accounts that were referenced in
/// a binding but never collected.
pub const UNKNOWN_PROJECT: &str = "UNKNOWN";

/// Full URI of a container (`organizations/N`, `folders/N`, `projects/N`).
pub fn container_uri(name: &str) -> String {
    format!("//{CRM}/{name}")
}

pub fn resource_uri(service: &str, path: &str) -> String {
    format!("//{service}/{path}")
}

pub fn service_account_uri(project: &str, email: &str) -> String {
    format!("//{IAM}/projects/{project}/serviceAccounts/{email}")
}

pub fn unknown_service_account_uri(email: &str) -> String {
    service_account_uri(UNKNOWN_PROJECT, email)
}

/// Build the canonical URI for `path` under `service`, rewriting the first
/// `projects/<id>` segment to the project number when the map has the id.
pub fn build_full_resource_uri(
    service: &str,
    path: &str,
    project_numbers: &HashMap<String, String>,
) -> String {
    format!("//{service}/{}", rewrite_project_segment(path, project_numbers))
}

fn rewrite_project_segment(path: &str, project_numbers: &HashMap<String, String>) -> String {
    if let Some(start) = path.find("projects/") {
        let id_start = start + "projects/".len();
        let id_end = path[id_start..]
            .find('/')
            .map(|i| id_start + i)
            .unwrap_or(path.len());
        if let Some(number) = project_numbers.get(&path[id_start..id_end]) {
            let mut rewritten = String::with_capacity(path.len());
            rewritten.push_str(&path[..id_start]);
            rewritten.push_str(number);
            rewritten.push_str(&path[id_end..]);
            return rewritten;
        }
    }
    path.to_string()
}
