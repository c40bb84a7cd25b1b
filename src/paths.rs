//! Path resolution for the CLI
//!
//! # Environment Variables
//!
//! - `VIRTFORGE_CONFIG` - Config file used when `--config` is not given
//!
//! Paths given on the command line may use `~` and `$VAR`; they are
//! expanded here. Host paths from the compiled plan are re-rooted under
//! `--root` with [`hostplan::layout::rooted`].

use std::path::PathBuf;

/// Environment variable for the config file override
pub const ENV_CONFIG: &str = "VIRTFORGE_CONFIG";

/// Default config file location
pub const DEFAULT_CONFIG: &str = "/etc/virtforge/config.toml";

/// Expand a path string with shell-like expansion
///
/// Supports `~` and `$VAR`/`${VAR}`. Unknown variables leave the input
/// unchanged.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
