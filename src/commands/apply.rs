//! `stackplan apply` - execute stage graphs through the state-file backend

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use topology::{ExecuteOptions, ExecuteReport, execute, qualified_id, total_summary};

use crate::Context;
use crate::backend::{StateFileBackend, resolve_state_dir};
use crate::cli::ApplyArgs;
use crate::config::StageConfig;
use crate::progress::{BarProgress, PromptConfirm};
use crate::stacks::service;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let config = super::load_stages(ctx)?;
    let stages = super::select(&config, &args.selection)?;
    let state_dir = resolve_state_dir(args.state_dir.as_deref())?;
    let backend = StateFileBackend::new(&state_dir);

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs.max(1) as usize,
        verbose: ctx.verbose > 0,
        prune: !args.no_prune,
        keep: Vec::new(),
    };

    if !ctx.quiet {
        ui::header("Apply");
        ui::kv("State", &backend.dir().display().to_string());
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        ui::kv("Stages", &names.join(", "));
        ui::kv("Parallel jobs", &opts.jobs.to_string());
    }

    let mut reports = Vec::new();
    let mut failed = Vec::new();

    // Stages run one after another so prompts and progress stay readable.
    for (index, stage) in stages.iter().enumerate() {
        println!();
        ui::step(index + 1, stages.len(), &format!("Stage {}", stage.name.bold()));

        match apply_stage(ctx, stage, &backend, &opts, args.yes) {
            Ok(report) => {
                print_report(ctx, &report, opts.dry_run);
                if !report.summary.is_success() {
                    failed.push(stage.name.clone());
                }
                reports.push(report);
            }
            Err(e) => {
                super::report_failure(&stage.name, &e);
                failed.push(stage.name.clone());
            }
        }
    }

    if !opts.dry_run {
        print_totals(&reports);
    }
    super::finish(&failed)
}

fn apply_stage(
    ctx: &Context,
    stage: &StageConfig,
    backend: &StateFileBackend,
    opts: &ExecuteOptions,
    yes: bool,
) -> Result<ExecuteReport> {
    // Without the service stack, fall back to the function recorded by an
    // earlier apply of this stage. That record stays in state so the next
    // apply can import it again.
    let fallback = if stage.components.service || stage.imports().is_some() {
        None
    } else {
        backend.imported_outputs(&stage.name)?
    };
    let mut opts = opts.clone();
    if fallback.is_some() {
        opts.keep.push(qualified_id(&stage.name, service::FUNCTION));
    }
    let built = super::build_stage(stage, fallback)?;

    if opts.dry_run {
        let plan = super::plan::plan_graph(&built.graph, true)?;
        ui::warn("Dry run - nothing will be recorded");
        if let Some(waves) = &plan.waves {
            for (index, wave) in waves.iter().enumerate() {
                println!("  {} wave {}: {}", "→".cyan(), index + 1, wave.join(", "));
            }
        }
    }

    let mut progress = BarProgress::new(ctx.verbose > 0);
    let mut confirm = PromptConfirm { assume_yes: yes };
    let report = execute(&built.graph, backend, &opts, &mut progress, &mut confirm)
        .with_context(|| format!("Failed to apply stage {}", built.context.name()))?;

    for (id, error) in progress.failures() {
        log::warn!("{} failed: {}", id, error);
    }
    Ok(report)
}

fn print_report(ctx: &Context, report: &ExecuteReport, dry_run: bool) {
    if dry_run {
        return;
    }

    for node in &report.nodes {
        if ctx.quiet && node.result.is_success() {
            continue;
        }
        if !node.result.is_change() && ctx.verbose == 0 && node.result.is_success() {
            continue;
        }
        println!(
            "  {} {:<28} {}",
            ui::result_symbol(&node.result),
            node.id,
            ui::result_label(&node.result).dimmed()
        );
    }
    for (id, result) in &report.pruned {
        println!(
            "  {} {:<28} {}",
            ui::result_symbol(result),
            id,
            ui::result_label(result).dimmed()
        );
    }

    let summary = &report.summary;
    if summary.total_changes() == 0 && summary.is_success() {
        ui::success(&format!("{}: up to date", report.stage));
    } else if summary.is_success() {
        ui::success(&format!(
            "{}: {} created, {} modified, {} removed",
            report.stage, summary.created, summary.modified, summary.removed
        ));
    } else {
        ui::error(&format!(
            "{}: {} failed, {} skipped",
            report.stage, summary.failed, summary.skipped
        ));
    }
}

fn print_totals(reports: &[ExecuteReport]) {
    if reports.len() < 2 {
        return;
    }
    let total = total_summary(reports);
    ui::section("Total");
    ui::kv("Created", &total.created.to_string());
    ui::kv("Modified", &total.modified.to_string());
    ui::kv("Removed", &total.removed.to_string());
    ui::kv("Unchanged", &total.no_change.to_string());
    if total.skipped > 0 {
        ui::kv("Skipped", &total.skipped.to_string().yellow().to_string());
    }
    if total.failed > 0 {
        ui::kv("Failed", &total.failed.to_string().red().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StageSelection;
    use tempfile::TempDir;

    fn context() -> Context {
        Context {
            verbose: 0,
            quiet: true,
            config: None,
        }
    }

    fn options() -> ExecuteOptions {
        ExecuteOptions {
            jobs: 2,
            ..ExecuteOptions::default()
        }
    }

    #[test]
    fn test_apply_stage_records_state() {
        let dir = TempDir::new().unwrap();
        let backend = StateFileBackend::new(dir.path());
        let stage = StageConfig::new("Beta");

        let report = apply_stage(&context(), &stage, &backend, &options(), true).unwrap();
        assert!(report.summary.is_success());
        assert!(dir.path().join("Beta.json").exists());
    }

    #[test]
    fn test_tables_only_stage_imports_recorded_function() {
        let dir = TempDir::new().unwrap();
        let backend = StateFileBackend::new(dir.path());
        let mut stage = StageConfig::new("Beta");
        apply_stage(&context(), &stage, &backend, &options(), true).unwrap();

        stage.components.service = false;
        let first = apply_stage(&context(), &stage, &backend, &options(), true).unwrap();
        assert!(first.summary.is_success());
        // grantRead now holds the literal ARN instead of a reference.
        assert_eq!(
            first.result_of("Beta-CatalogueTable"),
            Some(&topology::ApplyResult::NoChange)
        );
        let pruned: Vec<&str> = first.pruned.iter().map(|(id, _)| id.as_str()).collect();
        assert!(pruned.contains(&"Beta-Distribution"));
        assert!(!pruned.contains(&"Beta-GraphqlFunction"));

        let second = apply_stage(&context(), &stage, &backend, &options(), true).unwrap();
        assert_eq!(second.nodes.len(), 1);
        assert_eq!(
            second.result_of("Beta-CatalogueTable"),
            Some(&topology::ApplyResult::NoChange)
        );
        assert!(second.pruned.is_empty());
        assert_eq!(second.summary.total_changes(), 0);
    }

    #[test]
    fn test_dry_run_records_nothing() {
        let dir = TempDir::new().unwrap();
        let backend = StateFileBackend::new(dir.path());
        let stage = StageConfig::new("Prod");
        let opts = ExecuteOptions {
            dry_run: true,
            ..options()
        };
        let report = apply_stage(&context(), &stage, &backend, &opts, true).unwrap();
        assert!(report.nodes.is_empty());
        assert!(!dir.path().join("Prod.json").exists());
    }

    #[test]
    fn test_declined_apply_skips_everything() {
        let dir = TempDir::new().unwrap();
        let config = crate::config::StagesConfig::default();
        let selection = StageSelection {
            stages: vec!["Beta".to_string()],
            all: false,
        };
        let stages = crate::commands::select(&config, &selection).unwrap();
        let backend = StateFileBackend::new(dir.path());
        let built = crate::commands::build_stage(stages[0], None).unwrap();
        let report = execute(
            &built.graph,
            &backend,
            &options(),
            &mut topology::NoProgress,
            &mut topology::AutoDecline,
        )
        .unwrap();
        assert_eq!(report.summary.skipped, built.graph.len());
        assert!(!dir.path().join("Beta.json").exists());
    }
}
