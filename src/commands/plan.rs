//! `stackplan plan` - build and resolve stage graphs

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;
use topology::{DependencyGraph, ResourceKind, Resolver};

use crate::Context;
use crate::cli::{OutputFormat, PlanArgs};
use crate::ui;

/// One resource in a stage plan
#[derive(Debug, Serialize)]
pub struct PlannedNode {
    pub id: String,
    pub kind: ResourceKind,
    pub depends_on: Vec<String>,
}

/// Resolved plan for one stage
#[derive(Debug, Serialize)]
pub struct StagePlan {
    pub stage: String,
    /// Resources in apply order
    pub order: Vec<PlannedNode>,
    /// Dependency waves, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waves: Option<Vec<Vec<String>>>,
}

/// Plan output entry: a stage plan or the reason it could not be planned
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PlanEntry {
    Planned(StagePlan),
    Failed { stage: String, error: String },
}

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let config = super::load_stages(ctx)?;
    let stages = super::select(&config, &args.selection)?;

    // Stages are independent; each gets its own graph.
    let results: Vec<(String, Result<StagePlan>)> = stages
        .par_iter()
        .map(|stage| {
            let plan = super::build_stage(stage, None)
                .and_then(|built| plan_graph(&built.graph, args.waves));
            (stage.name.clone(), plan)
        })
        .collect();

    let failed: Vec<String> = results
        .iter()
        .filter(|(_, r)| r.is_err())
        .map(|(name, _)| name.clone())
        .collect();

    match args.format {
        OutputFormat::Json => print_json(results)?,
        OutputFormat::Text => {
            for (name, result) in &results {
                match result {
                    Ok(plan) => print_plan(ctx, plan),
                    Err(e) => super::report_failure(name, e),
                }
            }
            println!();
        }
    }

    super::finish(&failed)
}

/// Resolve a graph into a printable plan
pub fn plan_graph(graph: &DependencyGraph, with_waves: bool) -> Result<StagePlan> {
    let order = Resolver::resolve(graph)
        .with_context(|| format!("Failed to resolve stage {}", graph.stage()))?
        .map(|node| PlannedNode {
            id: node.id().to_string(),
            kind: node.kind(),
            depends_on: graph
                .dependencies_of(node.id())
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
        .collect();

    let waves = if with_waves {
        let waves = Resolver::waves(graph)?
            .into_iter()
            .map(|wave| wave.iter().map(|n| n.id().to_string()).collect())
            .collect();
        Some(waves)
    } else {
        None
    };

    Ok(StagePlan {
        stage: graph.stage().to_string(),
        order,
        waves,
    })
}

fn print_json(results: Vec<(String, Result<StagePlan>)>) -> Result<()> {
    let entries: Vec<PlanEntry> = results
        .into_iter()
        .map(|(stage, result)| match result {
            Ok(plan) => PlanEntry::Planned(plan),
            Err(e) => PlanEntry::Failed {
                stage,
                error: format!("{:#}", e),
            },
        })
        .collect();
    let json = serde_json::to_string_pretty(&entries).context("Failed to serialize plan")?;
    println!("{}", json);
    Ok(())
}

fn print_plan(ctx: &Context, plan: &StagePlan) {
    ui::section(&format!("Stage {}", plan.stage));

    if let Some(waves) = &plan.waves {
        for (index, wave) in waves.iter().enumerate() {
            ui::step(index + 1, waves.len(), &wave.join(", "));
        }
        return;
    }

    let total = plan.order.len();
    for (index, node) in plan.order.iter().enumerate() {
        let deps = if node.depends_on.is_empty() || ctx.quiet {
            String::new()
        } else {
            format!(" after {}", node.depends_on.join(", ")).dimmed().to_string()
        };
        println!(
            "  {:>2}. {:<28} {:<12}{}",
            index + 1,
            node.id,
            node.kind.as_str().cyan(),
            deps
        );
    }
    ui::dim(&format!("{} resources", total));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stacks::GraphBuilder;
    use topology::StageContext;

    #[test]
    fn test_plan_graph_order_and_dependencies() {
        let beta = StageContext::named("Beta").unwrap();
        let graph = GraphBuilder::new(&beta).build().unwrap();
        let plan = plan_graph(&graph, false).unwrap();

        assert_eq!(plan.order.len(), graph.len());
        assert_eq!(plan.order[0].id, "Beta-WebAssetsBucket");
        let route = plan
            .order
            .iter()
            .find(|n| n.id == "Beta-GraphqlRoute")
            .unwrap();
        assert!(route.depends_on.contains(&"Beta-GraphqlFunction".to_string()));
        assert!(plan.waves.is_none());
    }

    #[test]
    fn test_plan_graph_waves_cover_every_node() {
        let prod = StageContext::named("Prod").unwrap();
        let graph = GraphBuilder::new(&prod).build().unwrap();
        let plan = plan_graph(&graph, true).unwrap();
        let waves = plan.waves.unwrap();
        assert_eq!(waves.iter().map(Vec::len).sum::<usize>(), graph.len());
        assert!(waves[0].contains(&"Prod-WebAssetsBucket".to_string()));
    }

    #[test]
    fn test_failed_entry_serializes_error() {
        let entry = PlanEntry::Failed {
            stage: "Beta".to_string(),
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["stage"], "Beta");
        assert_eq!(json["error"], "boom");
    }
}
