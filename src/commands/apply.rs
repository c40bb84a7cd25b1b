//! Declarative commands over the emitted artifacts
//!
//! - `status` - Show current state vs desired state
//! - `diff` - Preview what apply would change
//! - `apply` - Make current state match desired state

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{
    DiffSummary, ExecuteOptions, ExecutionPlan, ResourceState, compute_diffs, execute,
    group_by_type,
};
use hostplan::layout::rooted;
use hostplan::{Artifact, ArtifactKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::config;
use crate::emit;
use crate::progress::{BarProgress, PromptConfirm};
use crate::ui;

/// Where to write and which resources to consider
pub struct Scope<'a> {
    pub config: &'a Path,
    pub root: &'a Path,
    /// `type` or `type:fragment`, e.g. `links` or `file:/etc/qemu`
    pub target: Option<&'a str>,
}

fn load_artifacts(config_path: &Path) -> Result<Vec<Artifact>> {
    let (_, compilation) = config::compile(config_path)?;
    hostplan::emit::plan(&compilation).context("Failed to plan artifacts")
}

fn build_plan(scope: &Scope, artifacts: &[Artifact]) -> ExecutionPlan {
    emit::plan(artifacts, scope.root).filter_by_target(scope.target)
}

// ============================================================================
// Status Command
// ============================================================================

pub fn status(ctx: &Context, scope: &Scope) -> Result<()> {
    ui::header("virtforge Status");

    let artifacts = load_artifacts(scope.config)?;
    let plan = build_plan(scope, &artifacts);

    if plan.is_empty() {
        ui::info("Nothing to manage");
        return Ok(());
    }

    let mut by_type: BTreeMap<&str, Vec<(String, ResourceState, ResourceState)>> = BTreeMap::new();
    for resource in plan.iter() {
        let current = resource.current_state().unwrap_or_else(|e| {
            log::warn!("cannot read state of {}: {:#}", resource.id(), e);
            ResourceState::Unknown
        });
        by_type.entry(resource.resource_type()).or_default().push((
            resource.id(),
            current,
            resource.desired_state(),
        ));
    }

    let mut converged = 0;
    for (resource_type, entries) in &by_type {
        ui::section(&format!("{}s", resource_type));
        for (id, current, desired) in entries {
            if current == desired {
                converged += 1;
                if ctx.quiet {
                    continue;
                }
            }
            println!("  {} {}", ui::state_symbol(current, desired), id);
            if ctx.verbose > 0 && current != desired {
                ui::dim(&format!("      {}", describe_state(current)));
            }
        }
    }

    println!();
    let total = plan.total_resources();
    if converged == total {
        ui::success(&format!("All {} resources up to date", total));
    } else {
        ui::warn(&format!(
            "{} of {} resources need changes (run 'virtforge apply')",
            total - converged,
            total
        ));
    }
    Ok(())
}

fn describe_state(state: &ResourceState) -> String {
    match state {
        ResourceState::Present { details: Some(d) } => d.clone(),
        ResourceState::Present { details: None } => "present".to_string(),
        ResourceState::Absent => "absent".to_string(),
        ResourceState::Modified { from, to } => format!("{} -> {}", from, to),
        ResourceState::Unknown => "unknown".to_string(),
    }
}

// ============================================================================
// Diff Command
// ============================================================================

pub fn diff(ctx: &Context, scope: &Scope) -> Result<()> {
    ui::header("Pending Changes");

    let artifacts = load_artifacts(scope.config)?;
    let plan = build_plan(scope, &artifacts);
    let diffs = compute_diffs(plan.iter());

    if diffs.is_empty() {
        ui::success("No changes");
        return Ok(());
    }

    let contents: BTreeMap<PathBuf, &str> = artifacts
        .iter()
        .filter_map(|a| match &a.kind {
            ArtifactKind::File { content, .. } => {
                Some((rooted(scope.root, &a.path), content.as_str()))
            }
            ArtifactKind::Link { .. } => None,
        })
        .collect();

    for (resource_type, group) in group_by_type(&diffs) {
        ui::section(&format!("{}s", resource_type));
        for d in group {
            println!("  {} {}", ui::state_symbol(&d.current, &d.desired), d.resource_id);
            if ctx.quiet {
                continue;
            }
            match contents.get(Path::new(&d.resource_id)) {
                Some(new) if !d.is_addition() => {
                    let old = fs::read_to_string(&d.resource_id).unwrap_or_default();
                    if !ui::text_diff(&old, new) {
                        ui::dim(&format!("      {}", describe_state(&d.current)));
                    }
                }
                Some(_) => ui::dim("      (new file)"),
                None => ui::dim(&format!("      {}", d.description)),
            }
        }
    }

    print_diff_summary(&DiffSummary::from_diffs(&diffs));
    Ok(())
}

fn print_diff_summary(summary: &DiffSummary) {
    println!();
    println!(
        "  {} to add, {} to change",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow()
    );
}

// ============================================================================
// Apply Command
// ============================================================================

pub fn apply(ctx: &Context, scope: &Scope, dry_run: bool, yes: bool, jobs: usize) -> Result<()> {
    ui::header("Applying Configuration");

    if dry_run {
        ui::warn("Dry run - no changes will be made");
        println!();
    }
    if scope.root != Path::new("/") {
        ui::kv("Root", &scope.root.display().to_string());
    }

    let artifacts = load_artifacts(scope.config)?;
    let plan = build_plan(scope, &artifacts);

    let diffs = compute_diffs(plan.iter());
    if !ctx.quiet && !diffs.is_empty() {
        for d in &diffs {
            println!("  {} {}", ui::state_symbol(&d.current, &d.desired), d.resource_id);
        }
        print_diff_summary(&DiffSummary::from_diffs(&diffs));
        println!();
    }

    let opts = ExecuteOptions {
        dry_run,
        jobs,
        verbose: ctx.verbose > 0,
    };
    let mut progress = BarProgress::new(ctx.verbose > 0);
    let mut confirm = PromptConfirm { assume_yes: yes };
    let summary = execute(plan, opts, &mut progress, &mut confirm)?;

    ui::kv("Created", &summary.created.to_string());
    ui::kv("Modified", &summary.modified.to_string());
    ui::kv("Unchanged", &summary.no_change.to_string());
    if summary.skipped > 0 {
        ui::kv("Skipped", &summary.skipped.to_string());
    }

    if !summary.is_success() {
        for failure in &summary.failures {
            ui::error(&format!("{}: {}", failure.resource_id, failure.error));
        }
        bail!("{} resource(s) failed", summary.failed);
    }

    println!();
    if dry_run {
        ui::info("Dry run complete");
    } else if summary.total_changes() == 0 {
        ui::success("Already up to date");
    } else {
        ui::success("Apply complete!");
    }
    Ok(())
}
