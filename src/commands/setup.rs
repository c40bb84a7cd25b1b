//! `setup` - the one-shot step the setup unit runs at boot

use anyhow::{Context as AnyhowContext, Result};
use declarative::ExecuteOptions;
use hostplan::SetupManifest;
use std::path::Path;

use crate::Context;
use crate::setup;
use crate::ui;

pub fn run(ctx: &Context, manifest_path: &Path, root: &Path, jobs: usize) -> Result<()> {
    let manifest = SetupManifest::load(manifest_path)
        .with_context(|| format!("Failed to load manifest: {}", manifest_path.display()))?;
    log::info!(
        "running {} with {} products under {}",
        manifest.unit,
        manifest.declarations.len(),
        root.display()
    );

    let opts = ExecuteOptions {
        jobs,
        verbose: ctx.verbose > 0,
        ..Default::default()
    };
    let summary = setup::run(&manifest, root, opts)?;

    if !ctx.quiet {
        ui::success(&format!(
            "{} changed, {} unchanged",
            summary.total_changes(),
            summary.no_change
        ));
    }
    Ok(())
}
