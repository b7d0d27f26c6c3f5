//! Diff computation between resource graphs
//!
//! Graphs are compared by logical node name, so the same topology built for
//! two stages lines up node-for-node. Stage-qualified strings (`Beta-X` vs
//! `Prod-X`) are normalized before properties are compared.

use crate::graph::DependencyGraph;
use crate::node::{ResourceKind, ResourceNode};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder substituted for the stage name during comparison
const STAGE_PLACEHOLDER: &str = "{stage}";

/// A single property difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub key: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Difference for a node present in both graphs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDiff {
    /// Logical node name
    pub name: String,
    pub kind_before: ResourceKind,
    pub kind_after: ResourceKind,
    pub changes: Vec<PropertyChange>,
}

impl NodeDiff {
    pub fn kind_changed(&self) -> bool {
        self.kind_before != self.kind_after
    }
}

/// Full difference between two graphs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDiff {
    /// Logical names only in the second graph
    pub added: Vec<String>,
    /// Logical names only in the first graph
    pub removed: Vec<String>,
    /// Nodes in both graphs whose kind or properties differ
    pub changed: Vec<NodeDiff>,
    /// Edges (by logical name) only in the second graph
    pub edges_added: Vec<(String, String)>,
    /// Edges (by logical name) only in the first graph
    pub edges_removed: Vec<(String, String)>,
}

impl GraphDiff {
    /// Same node names, kinds and edges
    pub fn same_shape(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.edges_added.is_empty()
            && self.edges_removed.is_empty()
            && !self.changed.iter().any(NodeDiff::kind_changed)
    }

    pub fn is_empty(&self) -> bool {
        self.same_shape() && self.changed.is_empty()
    }

    /// Property change for a node, if any
    pub fn change(&self, name: &str, key: &str) -> Option<&PropertyChange> {
        self.changed
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.changes.iter().find(|c| c.key == key))
    }

    /// Total number of differences
    pub fn total(&self) -> usize {
        self.added.len()
            + self.removed.len()
            + self.edges_added.len()
            + self.edges_removed.len()
            + self
                .changed
                .iter()
                .map(|d| d.changes.len() + usize::from(d.kind_changed()))
                .sum::<usize>()
    }
}

/// Compare two graphs
pub fn diff_graphs(before: &DependencyGraph, after: &DependencyGraph) -> GraphDiff {
    let before_nodes = by_name(before);
    let after_nodes = by_name(after);

    let mut diff = GraphDiff::default();

    for (name, node) in &before_nodes {
        match after_nodes.get(name) {
            None => diff.removed.push((*name).to_string()),
            Some(other) => {
                let changes = property_changes(node, other);
                if !changes.is_empty() || node.kind() != other.kind() {
                    diff.changed.push(NodeDiff {
                        name: (*name).to_string(),
                        kind_before: node.kind(),
                        kind_after: other.kind(),
                        changes,
                    });
                }
            }
        }
    }
    diff.added = after_nodes
        .keys()
        .filter(|name| !before_nodes.contains_key(*name))
        .map(|name| (*name).to_string())
        .collect();

    let before_edges = logical_edges(before);
    let after_edges = logical_edges(after);
    diff.edges_added = after_edges.difference(&before_edges).cloned().collect();
    diff.edges_removed = before_edges.difference(&after_edges).cloned().collect();

    diff
}

fn by_name(graph: &DependencyGraph) -> BTreeMap<&str, &ResourceNode> {
    graph.nodes().iter().map(|n| (n.name(), n)).collect()
}

fn logical_edges(graph: &DependencyGraph) -> BTreeSet<(String, String)> {
    let name_of = |id: &str| {
        graph
            .node(id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| id.to_string())
    };
    graph
        .edges()
        .iter()
        .map(|e| (name_of(&e.from), name_of(&e.to)))
        .collect()
}

/// Replace a leading `<stage>-` prefix, or a value equal to the stage name,
/// with the placeholder. Other occurrences of the stage text are left alone.
fn strip_stage(value: &str, stage: &str) -> String {
    if value == stage {
        return STAGE_PLACEHOLDER.to_string();
    }
    match value.strip_prefix(stage).and_then(|rest| rest.strip_prefix('-')) {
        Some(rest) => format!("{}-{}", STAGE_PLACEHOLDER, rest),
        None => value.to_string(),
    }
}

fn normalized(node: &ResourceNode) -> BTreeMap<String, Value> {
    let stage = node.stage();
    let rewrite = |s: &str| strip_stage(s, stage);
    node.properties()
        .iter()
        .map(|(k, v)| (k.clone(), normalize_refs(v.map_strings(&rewrite), &rewrite)))
        .collect()
}

fn normalize_refs<F: Fn(&str) -> String>(value: Value, rewrite: &F) -> Value {
    match value {
        Value::Ref(mut r) => {
            r.node = rewrite(&r.node);
            Value::Ref(r)
        }
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|v| normalize_refs(v, rewrite))
                .collect(),
        ),
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, normalize_refs(v, rewrite)))
                .collect(),
        ),
        other => other,
    }
}

fn property_changes(before: &ResourceNode, after: &ResourceNode) -> Vec<PropertyChange> {
    let left = normalized(before);
    let right = normalized(after);
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let a = left.get(key);
            let b = right.get(key);
            (a != b).then(|| PropertyChange {
                key: key.clone(),
                before: before.property(key).cloned(),
                after: after.property(key).cloned(),
            })
        })
        .collect()
}
