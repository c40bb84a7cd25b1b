//! Progress bar and confirmation prompt for the executor

use anyhow::Result;
use declarative::{ApplyResult, ConfirmCallback, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

/// Progress bar for one batch at a time
pub struct BarProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl BarProgress {
    pub fn new(verbose: bool) -> Self {
        Self { bar: None, verbose }
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, count: usize, concurrent: bool) {
        let pb = ProgressBar::new(count as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.set_message(if concurrent { "Applying" } else { "Linking" });
        self.bar = Some(pb);
    }

    fn on_resource_start(&mut self, id: &str, _description: &str) {
        if let Some(pb) = &self.bar {
            pb.set_message(ui::truncate_path(id, 40));
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        let Some(pb) = &self.bar else {
            return;
        };
        pb.set_message(format!("{} {}", ui::result_symbol(result), ui::truncate_path(id, 40)));
        pb.inc(1);
        if let ApplyResult::Failed { error } = result {
            pb.println(format!("  {} {}: {}", ui::result_symbol(result), id, error));
        } else if self.verbose && result.is_change() {
            pb.println(format!("  {} {}", ui::result_symbol(result), id));
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_and_clear();
        }
    }
}

/// Interactive confirmation, skipped entirely with `--yes`
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
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}
