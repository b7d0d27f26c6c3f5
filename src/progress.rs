//! Terminal progress and confirmation for stage applies

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use topology::{ApplyResult, ConfirmCallback, ProgressCallback};

/// Progress bar over the nodes of one stage
pub struct BarProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
    failures: Vec<(String, String)>,
}

impl BarProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            bar: None,
            verbose,
            failures: Vec::new(),
        }
    }

    /// Nodes that failed during the last stage, with their errors
    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }
}

impl ProgressCallback for BarProgress {
    fn on_stage_start(&mut self, stage: &str, count: usize) {
        let bar = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_prefix(stage.to_string());
        self.failures.clear();
        self.bar = Some(bar);
    }

    fn on_wave_start(&mut self, index: usize, count: usize) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("wave {} ({} resources)", index + 1, count));
        }
    }

    fn on_node_complete(&mut self, id: &str, result: &ApplyResult) {
        if let ApplyResult::Failed { error } = result {
            self.failures.push((id.to_string(), error.clone()));
        }
        let Some(bar) = &self.bar else {
            return;
        };
        if self.verbose {
            let line = match result {
                ApplyResult::Failed { error } => {
                    format!("{} {}: {}", result.symbol().red(), id, error)
                }
                ApplyResult::Skipped { reason } => {
                    format!("{} {} ({})", result.symbol().yellow(), id, reason.dimmed())
                }
                _ => format!("{} {}", result.symbol().green(), id),
            };
            bar.println(format!("  {}", line));
        }
        bar.set_message(format!("{} {}", result.symbol(), id));
        bar.inc(1);
    }

    fn on_stage_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Interactive yes/no prompt, skipped when `--yes` is given
pub struct PromptConfirm {
    pub assume_yes: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;

        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_failures() {
        let mut progress = BarProgress::new(false);
        progress.on_stage_start("Beta", 2);
        progress.on_node_complete("Beta-WebAssetsBucket", &ApplyResult::Created);
        progress.on_node_complete(
            "Beta-Distribution",
            &ApplyResult::Failed {
                error: "quota".to_string(),
            },
        );
        progress.on_stage_complete();
        assert_eq!(
            progress.failures(),
            &[("Beta-Distribution".to_string(), "quota".to_string())]
        );
    }

    #[test]
    fn test_assume_yes_skips_prompt() {
        let mut confirm = PromptConfirm { assume_yes: true };
        assert!(confirm.confirm("Apply?").unwrap());
    }
}
