//! Text rendering for emitted artifacts
//!
//! Pure functions from declarations to file contents. Nothing here touches
//! the filesystem.

pub mod files;
pub mod unit;
