//! Stack builders - compose the web service topology for a stage
//!
//! A stage graph is assembled from two stacks:
//! - the service stack (asset bucket, default page, distribution, function,
//!   optional secret, optional HTTP API and route)
//! - the tables stack (catalogue table with read access for the function)
//!
//! The tables stack only needs the function reference the service stack
//! exports. That reference is passed as a [`StackOutputs`] value, either
//! straight from the service stack in the same graph or imported from a graph
//! that was resolved and applied earlier.

pub mod service;
pub mod tables;

use topology::{DependencyGraph, Error, Result, StageContext, Value};

/// Which stacks and optional resources to include
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Components {
    /// Include the service stack
    pub service: bool,
    /// Include the HTTP API and its route
    pub api: bool,
    /// Logical name of the service secret, if one is used
    pub secret: Option<String>,
    /// Include the tables stack
    pub tables: bool,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            service: true,
            api: true,
            secret: Some("ServiceSecret".to_string()),
            tables: true,
        }
    }
}

/// Reference to the service function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionRef {
    /// Node in the graph being built
    Node(String),
    /// ARN of a function realized by another graph
    Arn(String),
}

/// Read-only snapshot of what one stack exports to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputs {
    pub function: FunctionRef,
}

impl StackOutputs {
    /// Outputs referencing a function node in the same graph
    pub fn in_graph(function_id: impl Into<String>) -> Self {
        Self {
            function: FunctionRef::Node(function_id.into()),
        }
    }

    /// Outputs of a service stack applied elsewhere
    pub fn imported(function_arn: impl Into<String>) -> Self {
        Self {
            function: FunctionRef::Arn(function_arn.into()),
        }
    }

    /// Property value pointing at the function ARN
    pub fn function_arn(&self) -> Value {
        match &self.function {
            FunctionRef::Node(id) => Value::reference(id.clone(), service::FUNCTION_ARN),
            FunctionRef::Arn(arn) => Value::from(arn.as_str()),
        }
    }

    /// Node that must be realized first, when the function lives in this graph
    pub fn function_node(&self) -> Option<&str> {
        match &self.function {
            FunctionRef::Node(id) => Some(id),
            FunctionRef::Arn(_) => None,
        }
    }

    fn validate(&self) -> Result<()> {
        let (FunctionRef::Node(value) | FunctionRef::Arn(value)) = &self.function;
        if value.trim().is_empty() {
            return Err(Error::configuration("imported function reference is empty"));
        }
        Ok(())
    }
}

/// Composes the stacks for one stage into a dependency graph
pub struct GraphBuilder<'a> {
    stage: &'a StageContext,
    components: Components,
    imports: Option<StackOutputs>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(stage: &'a StageContext) -> Self {
        Self {
            stage,
            components: Components::default(),
            imports: None,
        }
    }

    pub fn with_components(mut self, components: Components) -> Self {
        self.components = components;
        self
    }

    /// Supply outputs of a previously resolved graph
    pub fn with_imports(mut self, imports: Option<StackOutputs>) -> Self {
        self.imports = imports;
        self
    }

    /// Build the stage graph
    pub fn build(&self) -> Result<DependencyGraph> {
        let stage = self.stage.name();
        let mut graph = DependencyGraph::new(stage);

        let exported = if self.components.service {
            Some(service::build(&mut graph, self.stage, &self.components)?)
        } else {
            None
        };

        if self.components.tables {
            let outputs = exported.as_ref().or(self.imports.as_ref()).ok_or_else(|| {
                Error::configuration(format!(
                    "stage {}: the tables stack needs a function reference; \
                     enable the service stack or import its function ARN",
                    stage
                ))
            })?;
            outputs.validate()?;
            tables::build(&mut graph, self.stage, outputs)?;
        }

        if graph.is_empty() {
            return Err(Error::configuration(format!(
                "stage {}: no stacks enabled",
                stage
            )));
        }

        if let Some((holder, target)) = graph.unordered_references().into_iter().next() {
            return Err(Error::configuration(format!(
                "{} references {} without a dependency edge",
                holder, target
            )));
        }

        log::info!(
            "built {} resources and {} edges for stage {}",
            graph.len(),
            graph.edges().len(),
            stage
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use topology::{RemovalPolicy, ResourceKind, Resolver, diff_graphs};

    fn stage(name: &str) -> StageContext {
        StageContext::named(name).unwrap()
    }

    fn order(graph: &DependencyGraph) -> Vec<String> {
        Resolver::resolve(graph)
            .unwrap()
            .map(|n| n.id().to_string())
            .collect()
    }

    fn all_component_sets() -> Vec<Components> {
        let mut sets = Vec::new();
        for api in [true, false] {
            for secret in [Some("ServiceSecret".to_string()), None] {
                for tables in [true, false] {
                    sets.push(Components {
                        service: true,
                        api,
                        secret: secret.clone(),
                        tables,
                    });
                }
            }
        }
        sets
    }

    #[test]
    fn test_beta_scenario_nodes_and_edges() {
        let beta = stage("Beta");
        let graph = GraphBuilder::new(&beta).build().unwrap();

        let kinds: Vec<ResourceKind> = graph.nodes().iter().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Bucket,
                ResourceKind::Deployment,
                ResourceKind::Distribution,
                ResourceKind::Function,
                ResourceKind::Secret,
                ResourceKind::HttpApi,
                ResourceKind::Route,
                ResourceKind::Table,
            ]
        );

        let edges: HashSet<(&str, &str)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert!(edges.contains(&("Beta-DeployDefaultPage", "Beta-Distribution")));
        assert!(edges.contains(&("Beta-GraphqlFunction", "Beta-GraphqlRoute")));
        assert!(edges.contains(&("Beta-GraphqlFunction", "Beta-CatalogueTable")));

        let order = order(&graph);
        let at = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert!(at("Beta-WebAssetsBucket") < at("Beta-DeployDefaultPage"));
        assert!(at("Beta-DeployDefaultPage") < at("Beta-Distribution"));
        assert!(at("Beta-GraphqlFunction") < at("Beta-GraphqlRoute"));
        assert!(at("Beta-GraphqlFunction") < at("Beta-CatalogueTable"));
        assert!(at("Beta-Distribution") < at("Beta-HttpApi"));
        assert!(at("Beta-ServiceSecret") < at("Beta-GraphqlFunction"));
    }

    #[test]
    fn test_every_edge_respected_for_all_components() {
        for name in ["Beta", "Prod"] {
            let ctx = stage(name);
            for components in all_component_sets() {
                let graph = GraphBuilder::new(&ctx)
                    .with_components(components.clone())
                    .build()
                    .unwrap();
                let order = order(&graph);
                for edge in graph.edges() {
                    let from = order.iter().position(|o| *o == edge.from).unwrap();
                    let to = order.iter().position(|o| *o == edge.to).unwrap();
                    assert!(from < to, "{edge} violated for {components:?}");
                }
            }
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let ctx = stage("Beta");
        for components in all_component_sets() {
            let graph = GraphBuilder::new(&ctx)
                .with_components(components)
                .build()
                .unwrap();
            let ids: HashSet<&str> = graph.nodes().iter().map(|n| n.id()).collect();
            assert_eq!(ids.len(), graph.len());
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let ctx = stage("Prod");
        let first = order(&GraphBuilder::new(&ctx).build().unwrap());
        let second = order(&GraphBuilder::new(&ctx).build().unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_prod_retains_table_and_beta_only_changes_policy() {
        let prod = GraphBuilder::new(&stage("Prod")).build().unwrap();
        let table = prod.node("Prod-CatalogueTable").unwrap();
        assert_eq!(
            table.property("removalPolicy"),
            Some(&Value::from(RemovalPolicy::Retain.as_str()))
        );

        let beta = GraphBuilder::new(&stage("Beta")).build().unwrap();
        let diff = diff_graphs(&prod, &beta);
        assert!(diff.same_shape());
        assert!(diff.change("CatalogueTable", "removalPolicy").is_some());
        assert!(
            diff.changed
                .iter()
                .flat_map(|d| d.changes.iter())
                .all(|c| c.key == "removalPolicy"),
            "unexpected changes: {diff:?}"
        );
    }

    #[test]
    fn test_non_production_stages_diff_empty() {
        let beta = GraphBuilder::new(&stage("Beta")).build().unwrap();
        let cat = GraphBuilder::new(&stage("Cat")).build().unwrap();
        let diff = diff_graphs(&beta, &cat);
        assert!(diff.is_empty(), "unexpected diff: {diff:?}");
    }

    #[test]
    fn test_tables_without_function_reference_fails() {
        let ctx = stage("Beta");
        let err = GraphBuilder::new(&ctx)
            .with_components(Components {
                service: false,
                ..Components::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_tables_with_imported_function() {
        let ctx = stage("Beta");
        let arn = "arn:aws:lambda:local:000000000000:function:Beta-GraphqlFunction";
        let graph = GraphBuilder::new(&ctx)
            .with_components(Components {
                service: false,
                ..Components::default()
            })
            .with_imports(Some(StackOutputs::imported(arn)))
            .build()
            .unwrap();

        assert_eq!(graph.len(), 1);
        assert!(graph.edges().is_empty());
        let table = graph.node("Beta-CatalogueTable").unwrap();
        assert_eq!(
            table.property("grantRead"),
            Some(&Value::List(vec![Value::from(arn)]))
        );
    }

    #[test]
    fn test_empty_import_rejected() {
        let ctx = stage("Beta");
        let err = GraphBuilder::new(&ctx)
            .with_components(Components {
                service: false,
                ..Components::default()
            })
            .with_imports(Some(StackOutputs::imported("  ")))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_nothing_enabled_fails() {
        let ctx = stage("Beta");
        let err = GraphBuilder::new(&ctx)
            .with_components(Components {
                service: false,
                api: false,
                secret: None,
                tables: false,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_every_reference_has_an_edge() {
        let ctx = stage("Beta");
        for components in all_component_sets() {
            let graph = GraphBuilder::new(&ctx)
                .with_components(components)
                .build()
                .unwrap();
            assert!(graph.unordered_references().is_empty());
        }
    }
}
