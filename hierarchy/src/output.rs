//! Graph outputs: permission tuples and CONTAINS edges.

use std::sync::Arc;

use serde::Serialize;

use crate::model::Resource;

/// Audit trail attached to an emitted permission tuple.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// URIs of the containers whose policies produced the tuple; empty for
    /// bindings attached directly to the target resource.
    pub via_containers: Vec<String>,
    /// Role names (or, for deny tuples, the denied permission literal).
    pub via_roles: Vec<String>,
    pub conditional: bool,
    /// CEL expressions of the originating conditions, verbatim.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

/// `(Source principal, Permission, Target resource)` with provenance.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionTuple {
    pub source: Arc<Resource>,
    pub permission: String,
    pub target: Arc<Resource>,
    pub provenance: Provenance,
    pub is_deny: bool,
}

/// Parent/child structure edge.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainsEdge {
    pub parent: Arc<Resource>,
    pub child: Arc<Resource>,
}

/// Everything an analysis run emits, canonically sorted.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutput {
    pub tuples: Vec<PermissionTuple>,
    pub edges: Vec<ContainsEdge>,
}
