//! Tables stack - the catalogue table and its read grant

use topology::{DependencyGraph, ResourceKind, ResourceNode, Result, StageContext, Value};

use super::StackOutputs;

pub const CATALOGUE: &str = "CatalogueTable";

/// Physical table name for a stage
pub fn table_name(stage: &str) -> String {
    format!("{}-Catalogue", stage)
}

/// Add the tables stack to `graph`
///
/// The grant goes to whatever function `outputs` points at. When that
/// function is a node of the same graph the table depends on it.
pub fn build(
    graph: &mut DependencyGraph,
    stage: &StageContext,
    outputs: &StackOutputs,
) -> Result<()> {
    let name = stage.name();
    let table = ResourceNode::new(name, CATALOGUE, ResourceKind::Table)
        .with("tableName", table_name(name))
        .with(
            "partitionKey",
            Value::map([
                ("name", Value::from(".partitionKey")),
                ("type", Value::from("STRING")),
            ]),
        )
        .with("billingMode", "PAY_PER_REQUEST")
        .with("removalPolicy", stage.removal_policy().as_str())
        .with("grantRead", Value::List(vec![outputs.function_arn()]));

    let table_id = graph.add_node(table)?.id().to_string();
    if let Some(function) = outputs.function_node() {
        graph.add_edge(function, &table_id);
    }
    Ok(())
}
