//! Seed data: default definitions copied into persistent storage once

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState, ensure_dir, ensure_parent};

/// Copy `source` to `dest` only when nothing exists at `dest`
///
/// Symlinks are reproduced as symlinks with the same target. An existing
/// destination is never touched, whatever its content.
#[derive(Debug, Clone)]
pub struct SeedFile {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl SeedFile {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    fn copy(&self) -> Result<()> {
        ensure_parent(&self.dest)?;

        let meta = fs::symlink_metadata(&self.source)
            .with_context(|| format!("Seed source missing: {}", self.source.display()))?;
        if meta.file_type().is_symlink() {
            let target = fs::read_link(&self.source)?;
            std::os::unix::fs::symlink(&target, &self.dest).with_context(|| {
                format!("Failed to link {} -> {}", self.dest.display(), target.display())
            })?;
        } else if meta.is_file() {
            fs::copy(&self.source, &self.dest).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    self.source.display(),
                    self.dest.display()
                )
            })?;
        } else {
            bail!("Seed source is not a file: {}", self.source.display());
        }
        Ok(())
    }
}

impl Resource for SeedFile {
    fn id(&self) -> String {
        self.dest.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!("Seed {} from {}", self.dest.display(), self.source.display())
    }

    fn resource_type(&self) -> &'static str {
        "seed"
    }

    fn current_state(&self) -> Result<ResourceState> {
        if fs::symlink_metadata(&self.dest).is_ok() {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.current_state()?.is_present() {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }
        self.copy()?;
        Ok(ApplyResult::Created)
    }
}

/// A directory that must exist for seeded data, even when empty
#[derive(Debug, Clone)]
pub struct SeedDir {
    pub path: PathBuf,
}

impl Resource for SeedDir {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!("Directory {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "directory"
    }

    fn current_state(&self) -> Result<ResourceState> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Ok(ResourceState::Present { details: None }),
            Ok(_) => Ok(ResourceState::Modified {
                from: "not a directory".to_string(),
                to: "directory".to_string(),
            }),
            Err(_) => Ok(ResourceState::Absent),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match self.current_state()? {
            ResourceState::Present { .. } => Ok(ApplyResult::NoChange),
            ResourceState::Modified { .. } => {
                bail!("{} exists and is not a directory", self.path.display())
            }
            _ if ctx.dry_run => Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            }),
            _ => {
                ensure_dir(&self.path)?;
                Ok(ApplyResult::Created)
            }
        }
    }
}
