//! The one-shot setup step
//!
//! Runs as the ExecStart of the setup unit before the daemon starts. It reads
//! the manifest written at emission time and materializes the runtime
//! products: symlink sets, seed data, qemu.conf and privileged wrappers.
//!
//! Destinations are re-rooted under `root`; package paths are read as given.

use declarative::{ExecuteOptions, ExecuteSummary, ExecutionPlan, execute_simple};
use hostplan::layout::rooted;
use hostplan::resource::{Declaration, ResourceKind};
use hostplan::{Error, LinkSource, PrivilegeGrant, Result, SeedData, SetupManifest, SymlinkSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::resource::{ManagedFile, SeedDir, SeedFile, Symlink, Wrapper};

/// Expand every manifest declaration into filesystem resources
pub fn plan(manifest: &SetupManifest, root: &Path) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::new();
    for declaration in &manifest.declarations {
        add_declaration(&mut plan, declaration, root)?;
    }
    log::debug!(
        "Setup plan for {}: {} concurrent, {} sequential",
        manifest.unit,
        plan.concurrent.len(),
        plan.sequential.len()
    );
    Ok(plan)
}

/// Plan and apply a manifest
///
/// Every failure, whether the plan could not be built or a resource did not
/// converge, is reported as [`Error::SetupExecution`].
pub fn run(manifest: &SetupManifest, root: &Path, opts: ExecuteOptions) -> Result<ExecuteSummary> {
    let plan = plan(manifest, root).map_err(|e| Error::SetupExecution {
        failed: 1,
        details: e.to_string(),
    })?;

    let summary = execute_simple(plan, opts).map_err(|e| Error::SetupExecution {
        failed: 1,
        details: format!("{:#}", e),
    })?;

    if !summary.is_success() {
        return Err(Error::SetupExecution {
            failed: summary.failed,
            details: summary.failure_report(),
        });
    }
    Ok(summary)
}

fn add_declaration(plan: &mut ExecutionPlan, declaration: &Declaration, root: &Path) -> Result<()> {
    match &declaration.kind {
        ResourceKind::GeneratedFile(file) => plan.add(Box::new(ManagedFile {
            mode: file.mode,
            overwrite: file.overwrite,
            ..ManagedFile::new(rooted(root, &file.path), file.content.clone())
        })),
        ResourceKind::SymlinkSet(set) => add_links(plan, declaration, set, root)?,
        ResourceKind::SeedData(seed) => add_seeds(plan, seed, root)?,
        ResourceKind::PrivilegeGrant(grant) => plan.add(Box::new(wrapper(grant, root))),
        _ => {
            return Err(Error::validation(
                declaration.id.as_str(),
                format!("{} cannot be produced by the setup unit", declaration.kind_name()),
            ));
        }
    }
    Ok(())
}

fn add_links(
    plan: &mut ExecutionPlan,
    declaration: &Declaration,
    set: &SymlinkSet,
    root: &Path,
) -> Result<()> {
    let target_dir = rooted(root, &set.target_dir);
    for entry in &set.entries {
        match entry {
            LinkSource::File { path } => {
                let name = path.file_name().ok_or_else(|| {
                    Error::validation(
                        declaration.id.as_str(),
                        format!("link source has no file name: {}", path.display()),
                    )
                })?;
                plan.add(Box::new(Symlink::runtime(path.clone(), target_dir.join(name))));
            }
            LinkSource::Matching { dir, prefix } => {
                for source in matching_entries(dir, prefix) {
                    if let Some(name) = source.file_name() {
                        let target = target_dir.join(name);
                        plan.add(Box::new(Symlink::runtime(source.clone(), target)));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Entries of `dir` whose names start with `prefix`, sorted by name
///
/// An unreadable directory yields no entries.
fn matching_entries(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("No {}* links from {}: {}", prefix, dir.display(), e);
            return Vec::new();
        }
    };
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches
}

fn add_seeds(plan: &mut ExecutionPlan, seed: &SeedData, root: &Path) -> Result<()> {
    let dest_dir = rooted(root, &seed.dest_dir);
    plan.add(Box::new(SeedDir {
        path: dest_dir.clone(),
    }));
    for source in seed_sources(&seed.source_dir, &seed.extension)? {
        if let Some(name) = source.file_name() {
            let dest = dest_dir.join(name);
            plan.add(Box::new(SeedFile::new(source.clone(), dest)));
        }
    }
    Ok(())
}

/// Non-recursive listing of `*.<extension>` files and links in `dir`
fn seed_sources(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("seed directory missing: {}", dir.display()),
        )));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.path().extension().is_some_and(|ext| ext == extension) {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

fn wrapper(grant: &PrivilegeGrant, root: &Path) -> Wrapper {
    Wrapper {
        source: rooted(root, &grant.source),
        path: rooted(root, &grant.wrapper_path()),
        mode: grant.mode(),
        owner: grant.owner.clone(),
        group: grant.group.clone(),
    }
}
