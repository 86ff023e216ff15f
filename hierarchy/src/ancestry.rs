//! Container tree index: node lookup and closest-first ancestor chains.

use std::collections::HashMap;

/// Lightweight view of one container for ancestry queries. The full tree
/// stays in [`crate::model::Hierarchy`]; this index holds no children.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Node {
    Organization {
        uri: String,
        display_name: String,
    },
    Folder {
        uri: String,
        parent_uri: String,
        display_name: String,
    },
    Project {
        uri: String,
        parent_uri: String,
        project_id: String,
        number: String,
        display_name: String,
    },
}

impl Node {
    pub fn uri(&self) -> &str {
        match self {
            Node::Organization { uri, .. } | Node::Folder { uri, .. } | Node::Project { uri, .. } => uri,
        }
    }

    /// Empty for organizations.
    pub fn parent_uri(&self) -> &str {
        match self {
            Node::Organization { .. } => "",
            Node::Folder { parent_uri, .. } | Node::Project { parent_uri, .. } => parent_uri,
        }
    }
}

/// Records the container tree as it is collected and answers
/// "ancestors of URI", closest-first, ending at the organization.
#[derive(Default)]
pub struct AncestryBuilder {
    nodes: HashMap<String, Node>,
    ancestors: HashMap<String, Vec<String>>,
}

impl AncestryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_organization(&mut self, uri: impl Into<String>, display_name: impl Into<String>) {
        let uri = uri.into();
        self.ancestors.insert(uri.clone(), Vec::new());
        self.nodes.insert(
            uri.clone(),
            Node::Organization {
                uri,
                display_name: display_name.into(),
            },
        );
    }

    pub fn add_folder(
        &mut self,
        uri: impl Into<String>,
        parent_uri: impl Into<String>,
        display_name: impl Into<String>,
    ) {
        let uri = uri.into();
        let parent_uri = parent_uri.into();
        self.ancestors.insert(uri.clone(), self.chain_through(&parent_uri));
        self.nodes.insert(
            uri.clone(),
            Node::Folder {
                uri,
                parent_uri,
                display_name: display_name.into(),
            },
        );
    }

    pub fn add_project(
        &mut self,
        uri: impl Into<String>,
        parent_uri: impl Into<String>,
        project_id: impl Into<String>,
        number: impl Into<String>,
        display_name: impl Into<String>,
    ) {
        let uri = uri.into();
        let parent_uri = parent_uri.into();
        self.ancestors.insert(uri.clone(), self.chain_through(&parent_uri));
        self.nodes.insert(
            uri.clone(),
            Node::Project {
                uri,
                parent_uri,
                project_id: project_id.into(),
                number: number.into(),
                display_name: display_name.into(),
            },
        );
    }

    fn chain_through(&self, parent_uri: &str) -> Vec<String> {
        let mut chain = Vec::with_capacity(4);
        chain.push(parent_uri.to_string());
        if let Some(parent_chain) = self.ancestors.get(parent_uri) {
            chain.extend(parent_chain.iter().cloned());
        }
        chain
    }

    /// Closest-first ancestor URIs; empty for parent-less nodes and for
    /// URIs that were never added.
    pub fn ancestors(&self, uri: &str) -> &[String] {
        self.ancestors.get(uri).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node(&self, uri: &str) -> Option<&Node> {
        self.nodes.get(uri)
    }

    /// URIs of every project at or under `container_uri`, sorted. A project
    /// URI yields itself.
    pub fn project_uris_under(&self, container_uri: &str) -> Vec<String> {
        match self.nodes.get(container_uri) {
            Some(Node::Project { uri, .. }) => vec![uri.clone()],
            Some(_) => {
                let mut projects: Vec<String> = self
                    .nodes
                    .values()
                    .filter_map(|node| match node {
                        Node::Project { uri, .. }
                            if self.ancestors(uri).iter().any(|a| a == container_uri) =>
                        {
                            Some(uri.clone())
                        }
                        _ => None,
                    })
                    .collect();
                projects.sort();
                projects
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ORG: &str = "//cloudresourcemanager.googleapis.com/organizations/111";
    const F1: &str = "//cloudresourcemanager.googleapis.com/folders/1";
    const F2: &str = "//cloudresourcemanager.googleapis.com/folders/2";
    const P: &str = "//cloudresourcemanager.googleapis.com/projects/222";

    fn sample() -> AncestryBuilder {
        let mut ancestry = AncestryBuilder::new();
        ancestry.add_organization(ORG, "example.com");
        ancestry.add_folder(F1, ORG, "eng");
        ancestry.add_folder(F2, F1, "prod");
        ancestry.add_project(P, F2, "p-alpha", "222", "alpha");
        ancestry
    }

    #[test]
    fn chain_is_closest_first_ending_at_org() {
        let ancestry = sample();
        assert_eq!(ancestry.ancestors(P), &[F2.to_string(), F1.to_string(), ORG.to_string()]);
        assert_eq!(ancestry.ancestors(F1), &[ORG.to_string()]);
        assert!(ancestry.ancestors(ORG).is_empty());
    }

    #[test]
    fn unknown_uri_has_empty_chain() {
        assert!(sample().ancestors("//cloudresourcemanager.googleapis.com/folders/99").is_empty());
    }

    #[test]
    fn node_lookup_returns_variant() {
        let ancestry = sample();
        assert!(matches!(ancestry.node(ORG), Some(Node::Organization { .. })));
        assert!(matches!(ancestry.node(P), Some(Node::Project { .. })));
        assert!(ancestry.node("//nope").is_none());
    }

    #[test]
    fn projects_under_intermediate_folder() {
        let ancestry = sample();
        assert_eq!(ancestry.project_uris_under(F1), vec![P.to_string()]);
        assert_eq!(ancestry.project_uris_under(ORG), vec![P.to_string()]);
        assert_eq!(ancestry.project_uris_under(P), vec![P.to_string()]);
    }
}
