//! Dependency graph - resource nodes plus explicit depends-on edges

use crate::error::{Error, Result};
use crate::node::{ResourceKind, ResourceNode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A directed edge: `from` must be realized before `to`
///
/// Edges name nodes by id and do not own them. Resolving an id that is not
/// in the graph is an error reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// All resource nodes and edges for one stage
///
/// Node insertion order is preserved and used as the resolver's tie-breaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    stage: String,
    nodes: Vec<ResourceNode>,
    edges: Vec<Edge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Create an empty graph for a stage
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Self::default()
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Add a node, rejecting duplicate ids
    pub fn add_node(&mut self, node: ResourceNode) -> Result<&ResourceNode> {
        if self.index.contains_key(node.id()) {
            return Err(Error::DuplicateNode(node.id().to_string()));
        }
        log::debug!("graph {}: add {}", self.stage, node.description());
        let position = self.nodes.len();
        self.index.insert(node.id().to_string(), position);
        self.nodes.push(node);
        Ok(&self.nodes[position])
    }

    /// Declare that `to` depends on `from`
    ///
    /// Adding the same edge twice is a no-op. Endpoints are not checked here so
    /// that edges can be declared before both nodes exist; the resolver
    /// rejects edges whose endpoints never appear.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let edge = Edge::new(from, to);
        if !self.edges.contains(&edge) {
            log::debug!("graph {}: edge {}", self.stage, edge);
            self.edges.push(edge);
        }
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.position(id).map(|i| &self.nodes[i])
    }

    /// Insertion index of a node
    pub fn position(&self, id: &str) -> Option<usize> {
        // The index is not serialized; fall back to a scan after deserialization.
        if self.index.len() == self.nodes.len() {
            self.index.get(id).copied()
        } else {
            self.nodes.iter().position(|n| n.id() == id)
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes of a given kind, in insertion order
    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |n| n.kind() == kind)
    }

    /// Ids that `id` directly depends on
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from.as_str())
            .collect()
    }

    /// Ids that directly depend on `id`
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// Every node reachable from `id` through depends-on edges (excluding `id`)
    pub fn transitive_dependents(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            for next in self.dependents_of(&current) {
                if seen.insert(next.to_string()) {
                    stack.push(next.to_string());
                }
            }
        }
        seen.remove(id);
        seen
    }

    /// Check edges and property references against the node set
    pub fn validate(&self) -> Result<()> {
        for edge in &self.edges {
            if !self.contains(&edge.from) {
                return Err(Error::DanglingReference {
                    from: edge.to.clone(),
                    to: edge.from.clone(),
                });
            }
            if !self.contains(&edge.to) {
                return Err(Error::DanglingReference {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
        }

        for node in &self.nodes {
            for reference in node.references() {
                if !self.contains(&reference.node) {
                    return Err(Error::DanglingReference {
                        from: node.id().to_string(),
                        to: reference.node.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Property references that have no direct edge backing them
    ///
    /// Returned as `(holder, referenced)` pairs. Builders are expected to keep
    /// this empty so that ordering never depends on property contents.
    pub fn unordered_references(&self) -> Vec<(String, String)> {
        let edges: HashSet<(&str, &str)> = self
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();

        let mut missing = Vec::new();
        for node in &self.nodes {
            for reference in node.references() {
                let pair = (reference.node.as_str(), node.id());
                if !edges.contains(&pair) {
                    let entry = (node.id().to_string(), reference.node.clone());
                    if !missing.contains(&entry) {
                        missing.push(entry);
                    }
                }
            }
        }
        missing
    }
}
