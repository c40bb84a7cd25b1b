//! Compile a libvirt/QEMU host configuration into system resources
//!
//! This crate is pure: it never touches the host. It turns a TOML
//! configuration into a validated [`Configuration`], compiles that into an
//! ordered set of [`Declaration`]s, and plans the files and links that
//! realize them.
//!
//! # Example
//!
//! ```
//! use hostplan::{Configuration, compile, emit};
//!
//! let config = Configuration::from_toml_str(r#"
//! allowed_bridges = ["virbr0", "br1"]
//! [host]
//! arch = "aarch64"
//! "#).unwrap();
//!
//! let compilation = compile(&config).unwrap();
//! let artifacts = emit::plan(&compilation).unwrap();
//! assert!(!artifacts.is_empty());
//! ```
//!
//! # Pipeline
//!
//! 1. [`Options`] is parsed from TOML and validated into a [`Configuration`]
//! 2. [`compile`] produces declarations and checks them with a
//!    [`DependencyGraph`]; nothing is returned if any check fails
//! 3. [`emit::plan`] renders unit files, enablement links, generated
//!    configuration and the setup manifest
//! 4. At boot the setup unit loads the [`SetupManifest`] and materializes
//!    the runtime products (symlinks, seed data, qemu.conf, wrappers)

pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod layout;
pub mod render;
pub mod resource;

pub use compiler::{Compilation, compile};
pub use config::{BootPolicy, Configuration, HostOptions, Options, Packages, ShutdownPolicy};
pub use emit::{Artifact, ArtifactKind, SetupManifest};
pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use resource::{
    ActivationTrigger, ChangePolicy, Declaration, LinkSource, OverwritePolicy, PrivilegeGrant,
    ResourceId, ResourceKind, RestartPolicy, SeedData, Service, Socket, SymlinkSet, Target,
};
