//! Subcommand implementations
//!
//! Shared helpers here load the stage file, select stages and build a stage's
//! graph. Each subcommand reports per-stage failures and keeps going with the
//! remaining stages.

pub mod apply;
pub mod diff;
pub mod graph;
pub mod plan;
pub mod stages;

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use topology::{DependencyGraph, StageContext};

use crate::Context;
use crate::cli::StageSelection;
use crate::config::{StageConfig, StagesConfig};
use crate::stacks::{GraphBuilder, StackOutputs};
use crate::ui;

/// Load the stage file named by `--config`, or the default one
pub fn load_stages(ctx: &Context) -> Result<StagesConfig> {
    let (config, source) = StagesConfig::load(ctx.config.as_deref())?;
    match source {
        Some(path) => log::info!("Using stages from {}", path.display()),
        None => log::info!("Using built-in stages"),
    }
    Ok(config)
}

/// Resolve the stages a command should operate on
///
/// An empty selection (or `--all`) means every configured stage.
pub fn select<'a>(
    config: &'a StagesConfig,
    selection: &StageSelection,
) -> Result<Vec<&'a StageConfig>> {
    if selection.all || selection.stages.is_empty() {
        return Ok(config.stages.iter().collect());
    }

    let mut selected: Vec<&StageConfig> = Vec::new();
    for name in &selection.stages {
        let stage = find(config, name)?;
        if !selected.iter().any(|s| s.name == stage.name) {
            selected.push(stage);
        }
    }
    Ok(selected)
}

/// Find one configured stage by name
pub fn find<'a>(config: &'a StagesConfig, name: &str) -> Result<&'a StageConfig> {
    config.find_stage(name).with_context(|| {
        format!(
            "Stage '{}' not found (configured: {})",
            name,
            config.names().join(", ")
        )
    })
}

/// A stage's validated parameters and its graph
pub struct StageGraph {
    pub context: StageContext,
    pub graph: DependencyGraph,
}

/// Build the graph for one configured stage
///
/// `fallback` supplies the function reference when the service stack is not
/// part of this graph and the stage file does not import one.
pub fn build_stage(stage: &StageConfig, fallback: Option<StackOutputs>) -> Result<StageGraph> {
    let context = stage
        .context()
        .with_context(|| format!("Invalid stage '{}'", stage.name))?;
    let imports = stage.imports().or(fallback);

    let graph = GraphBuilder::new(&context)
        .with_components(stage.components())
        .with_imports(imports)
        .build()
        .with_context(|| format!("Failed to build graph for stage {}", context.name()))?;

    Ok(StageGraph { context, graph })
}

/// Print a stage failure, with advice when it came from the graph layer
pub fn report_failure(stage: &str, err: &anyhow::Error) {
    ui::error(&format!("{}: {:#}", stage.bold(), err));
    if let Some(graph_err) = err.downcast_ref::<topology::Error>() {
        let ids = graph_err.node_ids();
        if !ids.is_empty() {
            ui::dim(&format!("Resources: {}", ids.join(", ")));
        }
        ui::dim(graph_err.category().advice());
    }
}

/// Fail the command when any stage failed
pub fn finish(failed: &[String]) -> Result<()> {
    if failed.is_empty() {
        return Ok(());
    }
    anyhow::bail!(
        "{} stage{} failed: {}",
        failed.len(),
        if failed.len() == 1 { "" } else { "s" },
        failed.join(", ")
    )
}
