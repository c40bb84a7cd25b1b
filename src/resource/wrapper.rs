//! Privileged wrapper: an executable copied out of a helper directory with
//! its own owner and mode (typically setuid root)

use anyhow::{Context, Result, bail};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Resource, ResourceState, digest, ensure_dir, staging_file};

#[derive(Debug, Clone)]
pub struct Wrapper {
    /// Program to copy; symlinks are followed
    pub source: PathBuf,
    /// Installed wrapper path (already re-rooted)
    pub path: PathBuf,
    pub mode: u32,
    pub owner: String,
    pub group: String,
}

impl Wrapper {
    /// Resolve owner and group names to ids
    fn ids(&self) -> Result<(u32, u32)> {
        let uid = uzers::get_user_by_name(&self.owner)
            .map(|u| u.uid())
            .with_context(|| format!("Unknown user: {}", self.owner))?;
        let gid = uzers::get_group_by_name(&self.group)
            .map(|g| g.gid())
            .with_context(|| format!("Unknown group: {}", self.group))?;
        Ok((uid, gid))
    }

    fn details(&self, bytes: &[u8], mode: u32, uid: u32, gid: u32) -> String {
        format!("{} {:04o} {}:{}", digest(bytes), mode & 0o7777, uid, gid)
    }

    fn desired_details(&self) -> Result<String> {
        let bytes = fs::read(&self.source)
            .with_context(|| format!("Wrapper source missing: {}", self.source.display()))?;
        let (uid, gid) = self.ids()?;
        Ok(self.details(&bytes, self.mode, uid, gid))
    }

    fn install(&self) -> Result<()> {
        let (uid, gid) = self.ids()?;
        let dir = match self.path.parent() {
            Some(dir) => dir,
            None => bail!("Wrapper path has no parent: {}", self.path.display()),
        };
        ensure_dir(dir)?;

        let tmp = staging_file(dir, &self.path)?;
        fs::copy(&self.source, tmp.path()).with_context(|| {
            format!("Failed to copy {} to {}", self.source.display(), tmp.path().display())
        })?;
        // Ownership first: chown clears the setuid bit
        std::os::unix::fs::chown(tmp.path(), Some(uid), Some(gid)).with_context(|| {
            format!("Failed to chown {} to {}:{}", tmp.path().display(), self.owner, self.group)
        })?;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(self.mode))?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to install {}", self.path.display()))?;
        Ok(())
    }
}

impl Resource for Wrapper {
    fn id(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn description(&self) -> String {
        format!(
            "Wrapper {} ({:04o} {}:{}) from {}",
            self.path.display(),
            self.mode,
            self.owner,
            self.group,
            self.source.display()
        )
    }

    fn resource_type(&self) -> &'static str {
        "wrapper"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let meta = match fs::symlink_metadata(&self.path) {
            Ok(meta) => meta,
            Err(_) => return Ok(ResourceState::Absent),
        };
        if !meta.is_file() {
            return Ok(ResourceState::Modified {
                from: "not a regular file".to_string(),
                to: self.desired_details()?,
            });
        }

        let bytes = fs::read(&self.path)?;
        let current = self.details(&bytes, meta.mode(), meta.uid(), meta.gid());
        let desired = self.desired_details()?;
        if current == desired {
            Ok(ResourceState::Present {
                details: Some(desired),
            })
        } else {
            Ok(ResourceState::Modified {
                from: current,
                to: desired,
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.desired_details() {
            Ok(details) => ResourceState::Present {
                details: Some(details),
            },
            // Unresolvable source still differs from an unreadable current
            // state, so the failure surfaces on apply
            Err(_) => ResourceState::Present { details: None },
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let current = self.current_state()?;
        if current.is_present() {
            return Ok(ApplyResult::NoChange);
        }
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }
        self.install()?;
        if current.is_absent() {
            Ok(ApplyResult::Created)
        } else {
            Ok(ApplyResult::Modified)
        }
    }

    /// Wrappers copy from helper links created in the concurrent batch
    fn can_parallelize(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Wrapper owned by the current user, so the test needs no privileges
    fn wrapper(tmp: &TempDir, mode: u32) -> Wrapper {
        let owner = uzers::get_current_username()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let group = uzers::get_current_groupname()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        Wrapper {
            source: tmp.path().join("helpers/qemu-bridge-helper"),
            path: tmp.path().join("wrappers/bin/qemu-bridge-helper"),
            mode,
            owner,
            group,
        }
    }

    fn apply(w: &Wrapper) -> Result<ApplyResult> {
        w.apply(&mut ApplyContext::new(false, false))
    }

    #[test]
    fn test_install_follows_symlinked_source() {
        let tmp = TempDir::new().unwrap();
        let real = tmp.path().join("pkg/qemu-bridge-helper");
        fs::create_dir_all(real.parent().unwrap()).unwrap();
        fs::write(&real, "#!/bin/sh\n").unwrap();
        fs::create_dir_all(tmp.path().join("helpers")).unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("helpers/qemu-bridge-helper")).unwrap();

        let w = wrapper(&tmp, 0o755);
        assert_eq!(w.current_state().unwrap(), ResourceState::Absent);
        assert_eq!(apply(&w).unwrap(), ApplyResult::Created);

        let meta = fs::symlink_metadata(&w.path).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.mode() & 0o7777, 0o755);
        assert_eq!(fs::read_to_string(&w.path).unwrap(), "#!/bin/sh\n");

        assert_eq!(w.current_state().unwrap(), w.desired_state());
        assert_eq!(apply(&w).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn test_changed_source_is_reinstalled() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("helpers")).unwrap();
        let w = wrapper(&tmp, 0o755);
        fs::write(&w.source, "v1").unwrap();
        apply(&w).unwrap();

        fs::write(&w.source, "v2").unwrap();
        assert!(matches!(w.current_state().unwrap(), ResourceState::Modified { .. }));
        assert_eq!(apply(&w).unwrap(), ApplyResult::Modified);
        assert_eq!(fs::read_to_string(&w.path).unwrap(), "v2");
    }

    #[test]
    fn test_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let w = wrapper(&tmp, 0o755);
        assert!(apply(&w).is_err());
        assert_eq!(w.desired_state(), ResourceState::Present { details: None });
    }

    #[test]
    fn test_failed_install_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("helpers")).unwrap();
        let w = wrapper(&tmp, 0o755);
        fs::write(&w.source, "x").unwrap();
        fs::create_dir_all(w.path.join("occupied")).unwrap();

        assert!(w.install().is_err());
        let names: Vec<_> = fs::read_dir(w.path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["qemu-bridge-helper"]);
    }

    #[test]
    fn test_unknown_owner_fails() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("helpers")).unwrap();
        let mut w = wrapper(&tmp, 0o755);
        fs::write(&w.source, "x").unwrap();
        w.owner = "no-such-user-virtforge".to_string();

        let err = apply(&w).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown user"));
    }
}
