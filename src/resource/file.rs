//! Generated file resource

use anyhow::{Context, Result};
use hostplan::OverwritePolicy;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState, digest, ensure_parent, staging_file};

/// A file whose full content is generated
#[derive(Debug, Clone)]
pub struct ManagedFile {
    /// Where the file is written (already re-rooted)
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
    pub overwrite: OverwritePolicy,
}

impl ManagedFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            mode: 0o644,
            overwrite: OverwritePolicy::Always,
        }
    }

    fn details(&self, bytes: &[u8], mode: u32) -> String {
        format!("{} {:04o}", digest(bytes), mode & 0o7777)
    }

    /// Write through a temporary file in the same directory and rename over
    /// the destination; the temporary file is removed if any step fails
    fn write(&self) -> Result<()> {
        ensure_parent(&self.path)?;

        let dir = self.path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let mut tmp = staging_file(dir, &self.path)?;
        tmp.write_all(self.content.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(self.mode))?;
        tmp.as_file().sync_all()?;

        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl Resource for ManagedFile {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!("File {}", self.path.display())
    }

    fn resource_type(&self) -> &'static str {
        "file"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let meta = match fs::symlink_metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ResourceState::Absent),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", self.path.display()));
            }
        };

        if self.overwrite == OverwritePolicy::NeverIfExists {
            return Ok(self.desired_state());
        }
        if !meta.is_file() {
            return Ok(ResourceState::Modified {
                from: "not a regular file".to_string(),
                to: self.details(self.content.as_bytes(), self.mode),
            });
        }

        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let current = self.details(&bytes, meta.permissions().mode());
        let desired = self.details(self.content.as_bytes(), self.mode);
        if current == desired {
            Ok(self.desired_state())
        } else {
            Ok(ResourceState::Modified {
                from: current,
                to: desired,
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(self.details(self.content.as_bytes(), self.mode)),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let current = self.current_state()?;
        if current == self.desired_state() {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        if let Ok(meta) = fs::symlink_metadata(&self.path)
            && meta.is_dir()
        {
            anyhow::bail!("{} is a directory", self.path.display());
        }

        self.write()?;
        if current.is_absent() {
            Ok(ApplyResult::Created)
        } else {
            Ok(ApplyResult::Modified)
        }
    }
}
