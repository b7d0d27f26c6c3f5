use anyhow::Result;
use colored::Colorize;
use topology::{GraphDiff, Value, diff_graphs};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, from: &str, to: &str) -> Result<()> {
    let config = super::load_stages(ctx)?;
    let from_stage = super::find(&config, from)?;
    let to_stage = super::find(&config, to)?;

    let mut failed = Vec::new();
    let mut build = |stage: &crate::config::StageConfig| match super::build_stage(stage, None) {
        Ok(built) => Some(built),
        Err(e) => {
            super::report_failure(&stage.name, &e);
            failed.push(stage.name.clone());
            None
        }
    };
    let (Some(before), Some(after)) = (build(from_stage), build(to_stage)) else {
        return super::finish(&failed);
    };

    let diff = diff_graphs(&before.graph, &after.graph);
    ui::header(&format!(
        "{} → {}",
        before.context.name(),
        after.context.name()
    ));
    print_diff(&diff);
    Ok(())
}

fn print_diff(diff: &GraphDiff) {
    if diff.is_empty() {
        ui::success("Graphs are identical (ignoring stage names)");
        return;
    }

    for name in &diff.added {
        println!("  {} {}", "+".green(), name);
    }
    for name in &diff.removed {
        println!("  {} {}", "-".red(), name);
    }

    for node in &diff.changed {
        println!("  {} {}", "~".yellow(), node.name.bold());
        if node.kind_changed() {
            ui::kv("kind", &format!("{} → {}", node.kind_before, node.kind_after));
        }
        for change in &node.changes {
            ui::kv(
                &change.key,
                &format!("{} → {}", show(change.before.as_ref()), show(change.after.as_ref())),
            );
        }
    }

    for (from, to) in &diff.edges_added {
        println!("  {} edge {} → {}", "+".green(), from, to);
    }
    for (from, to) in &diff.edges_removed {
        println!("  {} edge {} → {}", "-".red(), from, to);
    }

    println!();
    if diff.same_shape() {
        ui::info(&format!(
            "Same shape; {} property difference(s)",
            diff.total()
        ));
    } else {
        ui::warn(&format!("Shapes differ; {} difference(s)", diff.total()));
    }
}

fn show(value: Option<&Value>) -> String {
    value.map_or_else(|| "(unset)".dimmed().to_string(), ToString::to_string)
}
