//! Filesystem resources
//!
//! Every change virtforge makes to a host is one of these resources:
//! - State detection (current vs desired)
//! - Apply function (converge current → desired)
//! - Ordering: links into enablement directories and privileged wrappers
//!   run sequentially after everything else

use anyhow::{Context, Result};
use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use tempfile::NamedTempFile;

pub use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};

pub mod file;
pub mod seed;
pub mod symlink;
pub mod wrapper;

pub use file::ManagedFile;
pub use seed::{SeedDir, SeedFile};
pub use symlink::Symlink;
pub use wrapper::Wrapper;

/// Short content digest used in state details
pub fn digest(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes).to_hex();
    hash.as_str()[..16].to_string()
}

/// Create a directory and its missing parents with mode 0755
pub fn ensure_dir(path: &Path) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Create the parent directory of `path`
pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Hidden temporary file next to `dest`, deleted on drop unless persisted
pub fn staging_file(dir: &Path, dest: &Path) -> Result<NamedTempFile> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".virtforge-tmp")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))
}
