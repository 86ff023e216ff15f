//! Member string parsing: every IAM member syntax into a structured
//! principal descriptor with a stable key.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

/// GKE workload-identity syntax: `PROJECT.svc.id.goog[NAMESPACE/NAME]`.
static KSA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^.]+)\.svc\.id\.goog\[([^/]+)/([^\]]+)\]$").unwrap());

/// An email-bearing principal (`user:`, `group:`, `serviceAccount:`).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EmailPrincipal {
    pub email: String,
    pub deleted: bool,
    /// The original member string, kept so deleted principals key on it.
    pub raw: String,
}

/// The two workload-identity member shapes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum WorkloadIdentity {
    /// `principal://…/workloadIdentityPools/{pool}/subject/{subject}`.
    Pool {
        pool: String,
        subject: String,
        uri: String,
    },
    /// `serviceAccount:PROJECT.svc.id.goog[NAMESPACE/NAME]`.
    KubernetesServiceAccount {
        project_id: String,
        namespace: String,
        name: String,
        raw: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BasicRole {
    Owner,
    Editor,
    Viewer,
}

impl BasicRole {
    pub fn role_name(&self) -> &'static str {
        match self {
            BasicRole::Owner => "roles/owner",
            BasicRole::Editor => "roles/editor",
            BasicRole::Viewer => "roles/viewer",
        }
    }
}

/// Structured identity descriptor produced by [`MemberNormalizer::normalize`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Principal {
    User(EmailPrincipal),
    Group(EmailPrincipal),
    Domain { domain: String },
    ServiceAccount(EmailPrincipal),
    /// Google-managed service agent (`service-…@….gserviceaccount.com`).
    ServiceAgent(EmailPrincipal),
    AllUsers,
    AllAuthenticatedUsers,
    WorkforceIdentity { pool: String, subject: String, uri: String },
    WorkloadIdentity(WorkloadIdentity),
    /// `principalSet://…` wildcard; the URI is retained verbatim.
    PrincipalSet { uri: String },
    /// `projectOwner:` / `projectEditor:` / `projectViewer:` convenience member.
    BasicRole {
        role: BasicRole,
        project_id: String,
        raw: String,
    },
    Unknown { raw: String },
}

impl Principal {
    /// Stable key for principal-keyed maps.
    ///
    /// Email-based kinds key on the email, or on the original
    /// `deleted:`-prefixed string for deleted principals. Federated kinds
    /// and principal sets key on their full URI.
    pub fn key(&self) -> String {
        match self {
            Principal::User(p)
            | Principal::Group(p)
            | Principal::ServiceAccount(p)
            | Principal::ServiceAgent(p) => {
                if p.deleted {
                    p.raw.clone()
                } else {
                    p.email.clone()
                }
            }
            Principal::Domain { domain } => format!("domain:{domain}"),
            Principal::AllUsers => "allUsers".to_string(),
            Principal::AllAuthenticatedUsers => "allAuthenticatedUsers".to_string(),
            Principal::WorkforceIdentity { uri, .. } => uri.clone(),
            Principal::WorkloadIdentity(WorkloadIdentity::Pool { uri, .. }) => uri.clone(),
            Principal::WorkloadIdentity(WorkloadIdentity::KubernetesServiceAccount {
                raw, ..
            }) => raw.clone(),
            Principal::PrincipalSet { uri } => uri.clone(),
            Principal::BasicRole { raw, .. } => raw.clone(),
            Principal::Unknown { raw } => raw.clone(),
        }
    }

    /// The member string this descriptor was parsed from, reconstructed for
    /// kinds that do not store it.
    pub fn raw_key(&self) -> String {
        match self {
            Principal::User(p)
            | Principal::Group(p)
            | Principal::ServiceAccount(p)
            | Principal::ServiceAgent(p) => p.raw.clone(),
            Principal::Domain { domain } => format!("domain:{domain}"),
            Principal::AllUsers => "allUsers".to_string(),
            Principal::AllAuthenticatedUsers => "allAuthenticatedUsers".to_string(),
            Principal::WorkforceIdentity { uri, .. } => uri.clone(),
            Principal::WorkloadIdentity(WorkloadIdentity::Pool { uri, .. }) => uri.clone(),
            Principal::WorkloadIdentity(WorkloadIdentity::KubernetesServiceAccount {
                raw, ..
            }) => raw.clone(),
            Principal::PrincipalSet { uri } => uri.clone(),
            Principal::BasicRole { raw, .. } => raw.clone(),
            Principal::Unknown { raw } => raw.clone(),
        }
    }
}

/// Parses member strings, memoizing on the raw input.
#[derive(Default)]
pub struct MemberNormalizer {
    cache: Mutex<HashMap<String, Principal>>,
}

impl MemberNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&self, raw: &str) -> Principal {
        if let Some(hit) = self.cache.lock().unwrap().get(raw) {
            return hit.clone();
        }
        let parsed = parse_member(raw);
        self.cache
            .lock()
            .unwrap()
            .insert(raw.to_string(), parsed.clone());
        parsed
    }
}

fn parse_member(raw: &str) -> Principal {
    let (body, deleted) = match raw.strip_prefix("deleted:") {
        Some(rest) => (rest, true),
        None => (raw, false),
    };

    match body {
        "allUsers" => return Principal::AllUsers,
        "allAuthenticatedUsers" => return Principal::AllAuthenticatedUsers,
        _ => {}
    }

    if let Some(email) = body.strip_prefix("user:") {
        return Principal::User(email_principal(email, deleted, raw));
    }
    if let Some(email) = body.strip_prefix("group:") {
        return Principal::Group(email_principal(email, deleted, raw));
    }
    if let Some(domain) = body.strip_prefix("domain:") {
        return Principal::Domain {
            domain: domain.to_string(),
        };
    }
    if let Some(value) = body.strip_prefix("serviceAccount:") {
        if let Some(caps) = KSA_RE.captures(value) {
            return Principal::WorkloadIdentity(WorkloadIdentity::KubernetesServiceAccount {
                project_id: caps[1].to_string(),
                namespace: caps[2].to_string(),
                name: caps[3].to_string(),
                raw: raw.to_string(),
            });
        }
        let principal = email_principal(value, deleted, raw);
        if value.starts_with("service-") && value.contains(".gserviceaccount.com") {
            return Principal::ServiceAgent(principal);
        }
        return Principal::ServiceAccount(principal);
    }
    if body.starts_with("principal://") {
        return parse_single_principal(body, raw);
    }
    if body.starts_with("principalSet://") {
        return Principal::PrincipalSet {
            uri: body.to_string(),
        };
    }
    if let Some(project_id) = body.strip_prefix("projectOwner:") {
        return basic_role(BasicRole::Owner, project_id, raw);
    }
    if let Some(project_id) = body.strip_prefix("projectEditor:") {
        return basic_role(BasicRole::Editor, project_id, raw);
    }
    if let Some(project_id) = body.strip_prefix("projectViewer:") {
        return basic_role(BasicRole::Viewer, project_id, raw);
    }

    Principal::Unknown {
        raw: raw.to_string(),
    }
}

fn email_principal(email: &str, deleted: bool, raw: &str) -> EmailPrincipal {
    EmailPrincipal {
        email: email.to_string(),
        deleted,
        raw: raw.to_string(),
    }
}

fn basic_role(role: BasicRole, project_id: &str, raw: &str) -> Principal {
    Principal::BasicRole {
        role,
        project_id: project_id.to_string(),
        raw: raw.to_string(),
    }
}

/// `principal://` URIs: workforce pools and workload-identity pools.
///
/// The pool name is the path up to and including the
/// `{workforcePools|workloadIdentityPools}/{id}` pair; the subject is
/// everything after `subject/`.
fn parse_single_principal(uri: &str, raw: &str) -> Principal {
    let rest = &uri["principal://".len()..];
    let segments: Vec<&str> = rest.split('/').collect();
    // segments[0] is the host (iam.googleapis.com)
    let path = &segments[1..];

    let marker = if path.contains(&"workforcePools") {
        "workforcePools"
    } else if path.contains(&"workloadIdentityPools") {
        "workloadIdentityPools"
    } else {
        return Principal::Unknown {
            raw: raw.to_string(),
        };
    };

    let pool = match path.iter().position(|s| *s == marker) {
        Some(index) if index + 1 < path.len() => path[..=index + 1].join("/"),
        _ => {
            return Principal::Unknown {
                raw: raw.to_string(),
            }
        }
    };
    let subject = uri
        .split_once("/subject/")
        .map(|(_, s)| s.to_string())
        .unwrap_or_default();

    if marker == "workforcePools" {
        Principal::WorkforceIdentity {
            pool,
            subject,
            uri: uri.to_string(),
        }
    } else {
        Principal::WorkloadIdentity(WorkloadIdentity::Pool {
            pool,
            subject,
            uri: uri.to_string(),
        })
    }
}
