use anyhow::Result;
use colored::Colorize;
use topology::{DependencyGraph, Value};

use crate::Context;
use crate::ui;

const VALUE_WIDTH: usize = 72;

pub fn run(ctx: &Context, stage: &str) -> Result<()> {
    let config = super::load_stages(ctx)?;
    let stage = super::find(&config, stage)?;

    let built = match super::build_stage(stage, None) {
        Ok(built) => built,
        Err(e) => {
            super::report_failure(&stage.name, &e);
            return super::finish(&[stage.name.clone()]);
        }
    };

    print_graph(ctx, &built.graph);
    Ok(())
}

fn print_graph(ctx: &Context, graph: &DependencyGraph) {
    ui::header(&format!("Stage {}", graph.stage()));

    ui::section("Resources");
    for node in graph.nodes() {
        println!("  {} {}", node.id().bold(), node.kind().as_str().cyan());
        if ctx.quiet {
            continue;
        }
        for (key, value) in node.properties() {
            ui::kv(&format!("  {}", key), &render(value));
        }
    }

    ui::section("Edges");
    if graph.edges().is_empty() {
        ui::dim("none");
    }
    for edge in graph.edges() {
        println!("  {} {} {}", edge.from, "→".dimmed(), edge.to);
    }
}

/// Single-line rendering of a property value
fn render(value: &Value) -> String {
    let text = ui::truncate(&value.to_string(), VALUE_WIDTH);
    match value {
        Value::Ref(_) => text.yellow().to_string(),
        _ => text,
    }
}
