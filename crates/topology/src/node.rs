//! Resource nodes - the leaf unit of a resource graph

use crate::value::{Reference, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of infrastructure resource a node describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Object storage bucket
    Bucket,
    /// Content delivery distribution
    Distribution,
    /// Static asset deployment into a bucket
    Deployment,
    /// Serverless compute function
    Function,
    /// Secret storage entry
    Secret,
    /// HTTP API gateway
    HttpApi,
    /// Route on an HTTP API
    Route,
    /// Key-value table
    Table,
}

impl ResourceKind {
    /// All kinds, in declaration order
    pub const ALL: [ResourceKind; 8] = [
        Self::Bucket,
        Self::Distribution,
        Self::Deployment,
        Self::Function,
        Self::Secret,
        Self::HttpApi,
        Self::Route,
        Self::Table,
    ];

    /// Stable type name used for display and state files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Distribution => "distribution",
            Self::Deployment => "deployment",
            Self::Function => "function",
            Self::Secret => "secret",
            Self::HttpApi => "http_api",
            Self::Route => "route",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed resource with a stage-qualified identity and a property bag
///
/// The kind is fixed at construction; there is no way to change it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    id: String,
    name: String,
    kind: ResourceKind,
    stage: String,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

impl ResourceNode {
    /// Create a node for `stage` with logical `name`; the id is `{stage}-{name}`
    pub fn new(stage: &str, name: &str, kind: ResourceKind) -> Self {
        Self {
            id: qualified_id(stage, name),
            name: name.to_string(),
            kind,
            stage: stage.to_string(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Set a property, returning the previous value if any
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(key.to_string(), value.into())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Logical name without the stage prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Every reference held in this node's properties
    pub fn references(&self) -> Vec<&Reference> {
        self.properties
            .values()
            .flat_map(Value::references)
            .collect()
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        format!("{} {}", self.kind, self.id)
    }
}

/// Build a stage-qualified id
pub fn qualified_id(stage: &str, name: &str) -> String {
    format!("{}-{}", stage, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_identity() {
        let node = ResourceNode::new("Beta", "WebAssetsBucket", ResourceKind::Bucket)
            .with("versioned", true);
        assert_eq!(node.id(), "Beta-WebAssetsBucket");
        assert_eq!(node.name(), "WebAssetsBucket");
        assert_eq!(node.stage(), "Beta");
        assert_eq!(node.kind(), ResourceKind::Bucket);
        assert_eq!(node.property("versioned"), Some(&Value::Bool(true)));
        assert_eq!(node.description(), "bucket Beta-WebAssetsBucket");
    }

    #[test]
    fn test_node_references() {
        let node = ResourceNode::new("Beta", "GraphqlRoute", ResourceKind::Route)
            .with("integration", Value::reference("Beta-GraphqlFunction", "functionArn"))
            .with("path", "/graphql");
        let refs = node.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].node, "Beta-GraphqlFunction");
    }

    #[test]
    fn test_kind_names_are_unique() {
        let names: std::collections::HashSet<_> =
            ResourceKind::ALL.iter().map(ResourceKind::as_str).collect();
        assert_eq!(names.len(), ResourceKind::ALL.len());
        assert_eq!(ResourceKind::HttpApi.to_string(), "http_api");
    }
}
