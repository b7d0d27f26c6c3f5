use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::config::StageConfig;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let config = super::load_stages(ctx)?;

    ui::header("Stages");

    let mut failed = Vec::new();
    for stage in &config.stages {
        if let Err(e) = show_stage(ctx, stage) {
            super::report_failure(&stage.name, &e);
            failed.push(stage.name.clone());
        }
    }

    println!();
    super::finish(&failed)
}

fn show_stage(ctx: &Context, stage: &StageConfig) -> Result<()> {
    let context = stage.context()?;
    let components = stage.components();

    let marker = if context.is_production() {
        " (production)".yellow().to_string()
    } else {
        String::new()
    };
    ui::section(&format!("{}{}", context.name(), marker));
    ui::kv("Removal policy", context.removal_policy().as_str());
    ui::kv("Domain", context.domain().unwrap_or("-"));

    if !context.cors_origins().is_empty() {
        let origins: Vec<&str> = context.cors_origins().iter().map(String::as_str).collect();
        ui::kv("CORS origins", &origins.join(", "));
    }

    let mut stacks = Vec::new();
    if components.service {
        stacks.push("service");
    }
    if components.tables {
        stacks.push("tables");
    }
    ui::kv("Stacks", &stacks.join(", "));
    ui::kv("API", if components.api { "yes" } else { "no" });
    ui::kv("Secret", components.secret.as_deref().unwrap_or("-"));

    if let Some(arn) = &stage.imports.function_arn {
        ui::kv("Imported function", arn);
    }

    if ctx.verbose > 0 {
        match super::build_stage(stage, None) {
            Ok(built) => ui::dim(&format!(
                "{} resources, {} edges",
                built.graph.len(),
                built.graph.edges().len()
            )),
            Err(e) => ui::dim(&format!("graph: {:#}", e)),
        }
    }

    Ok(())
}
