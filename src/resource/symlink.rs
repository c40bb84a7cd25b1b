//! Symlink resource - create-or-replace, like `ln -sf`

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState, ensure_parent};

/// A symlink to create
///
/// Link targets are compared literally, never canonicalized: enablement
/// links may point at unit files that only exist on the real host.
#[derive(Debug, Clone)]
pub struct Symlink {
    /// What the symlink points to
    pub source: PathBuf,
    /// Where the symlink is created (already re-rooted)
    pub target: PathBuf,
    /// Log a warning when `source` does not exist; the link is created anyway
    pub warn_dangling: bool,
    /// Replace a regular file at `target`
    pub force: bool,
    /// Apply in the concurrent batch
    pub parallel: bool,
}

impl Symlink {
    /// Link created by the setup step: anything in the way is replaced, and a
    /// missing source leaves a dangling link with a warning
    pub fn runtime(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            warn_dangling: true,
            force: true,
            parallel: true,
        }
    }

    /// Enablement link: target unit need not exist yet, user files are kept
    pub fn enablement(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            warn_dangling: false,
            force: false,
            parallel: false,
        }
    }

    /// Check current symlink state
    fn check_current(&self) -> Result<SymlinkState> {
        let meta = match fs::symlink_metadata(&self.target) {
            Ok(meta) => meta,
            Err(_) => return Ok(SymlinkState::Missing),
        };

        if meta.file_type().is_symlink() {
            let link_target = fs::read_link(&self.target).context("Failed to read symlink")?;
            if link_target == self.source {
                Ok(SymlinkState::Correct)
            } else {
                Ok(SymlinkState::WrongTarget(link_target))
            }
        } else if meta.is_dir() {
            Ok(SymlinkState::DirExists)
        } else {
            Ok(SymlinkState::FileExists)
        }
    }

    /// Create the symlink, replacing whatever link or file is in the way
    fn create_symlink(&self) -> Result<()> {
        if self.warn_dangling && fs::symlink_metadata(&self.source).is_err() {
            log::warn!(
                "Link source does not exist: {} (linking {} anyway)",
                self.source.display(),
                self.target.display()
            );
        }

        ensure_parent(&self.target)?;

        if fs::symlink_metadata(&self.target).is_ok() {
            fs::remove_file(&self.target).with_context(|| {
                format!("Failed to remove existing entry: {}", self.target.display())
            })?;
        }

        std::os::unix::fs::symlink(&self.source, &self.target).with_context(|| {
            format!(
                "Failed to create symlink: {} -> {}",
                self.target.display(),
                self.source.display()
            )
        })?;

        Ok(())
    }
}

#[derive(Debug)]
enum SymlinkState {
    Missing,
    Correct,
    WrongTarget(PathBuf),
    FileExists,
    DirExists,
}

impl Resource for Symlink {
    fn id(&self) -> String {
        self.target.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!(
            "Symlink {} -> {}",
            self.target.display(),
            self.source.display()
        )
    }

    fn resource_type(&self) -> &'static str {
        if self.parallel { "symlink" } else { "link" }
    }

    fn current_state(&self) -> Result<ResourceState> {
        match self.check_current()? {
            SymlinkState::Missing => Ok(ResourceState::Absent),
            SymlinkState::Correct => Ok(self.desired_state()),
            SymlinkState::WrongTarget(actual) => Ok(ResourceState::Modified {
                from: actual.to_string_lossy().to_string(),
                to: self.source.to_string_lossy().to_string(),
            }),
            SymlinkState::FileExists => Ok(ResourceState::Modified {
                from: "regular file".to_string(),
                to: format!("symlink -> {}", self.source.display()),
            }),
            SymlinkState::DirExists => Ok(ResourceState::Modified {
                from: "directory".to_string(),
                to: format!("symlink -> {}", self.source.display()),
            }),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: Some(format!("-> {}", self.source.display())),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let state = self.check_current()?;
        if matches!(state, SymlinkState::Correct) {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        match state {
            SymlinkState::Correct => Ok(ApplyResult::NoChange),
            SymlinkState::Missing => {
                self.create_symlink()?;
                Ok(ApplyResult::Created)
            }
            SymlinkState::WrongTarget(_) => {
                self.create_symlink()?;
                Ok(ApplyResult::Modified)
            }
            SymlinkState::FileExists if self.force => {
                self.create_symlink()?;
                Ok(ApplyResult::Modified)
            }
            SymlinkState::FileExists => Ok(ApplyResult::Skipped {
                reason: format!("File exists at {}", self.target.display()),
            }),
            SymlinkState::DirExists => {
                bail!("Directory exists at {}", self.target.display())
            }
        }
    }

    fn can_parallelize(&self) -> bool {
        self.parallel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn apply(link: &Symlink) -> Result<ApplyResult> {
        link.apply(&mut ApplyContext::new(false, false))
    }

    #[test]
    fn test_create_and_idempotent() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("qemu-kvm");
        fs::write(&source, "").unwrap();
        let link = Symlink::runtime(&source, tmp.path().join("emulators/qemu-kvm"));

        assert_eq!(link.current_state().unwrap(), ResourceState::Absent);
        assert_eq!(apply(&link).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read_link(&link.target).unwrap(), source);
        assert_eq!(apply(&link).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn test_replaces_wrong_target() {
        let tmp = TempDir::new().unwrap();
        let old = tmp.path().join("old");
        let new = tmp.path().join("new");
        fs::write(&old, "").unwrap();
        fs::write(&new, "").unwrap();
        let target = tmp.path().join("link");
        std::os::unix::fs::symlink(&old, &target).unwrap();

        let link = Symlink::runtime(&new, &target);
        assert!(matches!(link.current_state().unwrap(), ResourceState::Modified { .. }));
        assert_eq!(apply(&link).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_link(&target).unwrap(), new);
    }

    #[test]
    fn test_missing_source_creates_dangling_link() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("absent");
        let link = Symlink::runtime(&source, tmp.path().join("link"));

        assert_eq!(apply(&link).unwrap(), ApplyResult::Created);
        assert_eq!(fs::read_link(&link.target).unwrap(), source);
        assert!(!link.target.exists());
        assert_eq!(apply(&link).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn test_enablement_link_to_missing_unit() {
        let tmp = TempDir::new().unwrap();
        let link = Symlink::enablement(
            "/etc/systemd/system/libvirtd.socket",
            tmp.path().join("sockets.target.wants/libvirtd.socket"),
        );

        assert!(!link.can_parallelize());
        assert_eq!(apply(&link).unwrap(), ApplyResult::Created);
        assert_eq!(link.current_state().unwrap(), link.desired_state());
    }

    #[test]
    fn test_enablement_keeps_regular_file() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("libvirtd.socket");
        fs::write(&target, "user file").unwrap();

        let link = Symlink::enablement("/etc/systemd/system/libvirtd.socket", &target);
        assert!(matches!(apply(&link).unwrap(), ApplyResult::Skipped { .. }));
        assert_eq!(fs::read_to_string(&target).unwrap(), "user file");
    }

    #[test]
    fn test_runtime_replaces_regular_file() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("qemu-pr-helper");
        fs::write(&source, "").unwrap();
        let target = tmp.path().join("helpers/qemu-pr-helper");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "stale copy").unwrap();

        let link = Symlink::runtime(&source, &target);
        assert_eq!(apply(&link).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_link(&target).unwrap(), source);
    }
}
