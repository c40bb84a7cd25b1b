//! Resource declarations produced by the compiler
//!
//! A declaration is an abstract description of something the host service
//! manager or filesystem materializes. Declarations never touch the host;
//! see [`crate::emit`] for how they become files.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Unique id of a declaration within one compilation
///
/// Services, sockets and external units use their unit name
/// (`libvirtd.service`); everything else is prefixed with its kind
/// (`group:libvirtd`, `file:/etc/qemu/bridge.conf`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single compiled resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: ResourceId,
    pub description: String,
    pub kind: ResourceKind,
}

impl Declaration {
    pub fn new(id: impl Into<ResourceId>, description: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind,
        }
    }

    /// The setup unit that materializes this declaration at runtime, if any
    pub fn produced_by(&self) -> Option<&ResourceId> {
        match &self.kind {
            ResourceKind::GeneratedFile(file) => file.produced_by.as_ref(),
            ResourceKind::SymlinkSet(set) => set.produced_by.as_ref(),
            ResourceKind::SeedData(seed) => Some(&seed.produced_by),
            ResourceKind::PrivilegeGrant(grant) => Some(&grant.produced_by),
            _ => None,
        }
    }

    /// Every id this declaration refers to, with the field it came from
    pub fn references(&self) -> Vec<(&'static str, &ResourceId)> {
        let mut refs = Vec::new();
        match &self.kind {
            ResourceKind::Service(service) => {
                refs.extend(service.depends_on.iter().map(|id| ("depends_on", id)));
                refs.extend(service.run_after.iter().map(|id| ("run_after", id)));
                if let ActivationTrigger::FirstConnection { socket } = &service.activation {
                    refs.push(("activation", socket));
                }
            }
            ResourceKind::Socket(socket) => refs.push(("service", &socket.service)),
            ResourceKind::PrincipalUser(user) => refs.push(("group", &user.group)),
            _ => {}
        }
        if let Some(producer) = self.produced_by() {
            refs.push(("produced_by", producer));
        }
        refs
    }

    pub fn as_service(&self) -> Option<&Service> {
        match &self.kind {
            ResourceKind::Service(service) => Some(service),
            _ => None,
        }
    }

    pub fn as_socket(&self) -> Option<&Socket> {
        match &self.kind {
            ResourceKind::Socket(socket) => Some(socket),
            _ => None,
        }
    }

    /// Short type name used for grouping and filtering
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ResourceKind::Service(_) => "service",
            ResourceKind::Socket(_) => "socket",
            ResourceKind::ExternalUnit(_) => "external_unit",
            ResourceKind::GeneratedFile(_) => "file",
            ResourceKind::SymlinkSet(_) => "symlinks",
            ResourceKind::SeedData(_) => "seed",
            ResourceKind::PrincipalGroup(_) => "group",
            ResourceKind::PrincipalUser(_) => "user",
            ResourceKind::PrivilegeGrant(_) => "grant",
            ResourceKind::KernelModule(_) => "kernel_module",
            ResourceKind::AuthorizationRule(_) => "authorization_rule",
        }
    }
}

/// Declaration variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    Service(Service),
    Socket(Socket),
    /// A unit owned by another part of the host, referenced only for ordering
    ExternalUnit(ExternalUnit),
    GeneratedFile(GeneratedFile),
    SymlinkSet(SymlinkSet),
    SeedData(SeedData),
    PrincipalGroup(PrincipalGroup),
    PrincipalUser(PrincipalUser),
    PrivilegeGrant(PrivilegeGrant),
    KernelModule(KernelModule),
    AuthorizationRule(AuthorizationRule),
}

// ============================================================================
// Services and sockets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub service_type: ServiceType,
    pub command: Vec<String>,
    /// Runs when the unit stops (oneshot units with remain-after-exit)
    pub stop_command: Option<Vec<String>>,
    /// Units that must start successfully for this one to start
    pub depends_on: BTreeSet<ResourceId>,
    /// Units this one is ordered after
    pub run_after: BTreeSet<ResourceId>,
    pub restart: RestartPolicy,
    pub on_change: ChangePolicy,
    pub activation: ActivationTrigger,
    pub environment: BTreeMap<String, String>,
    pub working_paths: WorkingPaths,
    pub kill_mode: Option<KillMode>,
    pub start_timeout_secs: Option<u32>,
    pub remain_after_exit: bool,
}

impl Service {
    pub fn new(service_type: ServiceType, command: Vec<String>) -> Self {
        Self {
            service_type,
            command,
            stop_command: None,
            depends_on: BTreeSet::new(),
            run_after: BTreeSet::new(),
            restart: RestartPolicy::No,
            on_change: ChangePolicy::Restart,
            activation: ActivationTrigger::Dependency,
            environment: BTreeMap::new(),
            working_paths: WorkingPaths::default(),
            kill_mode: None,
            start_timeout_secs: None,
            remain_after_exit: false,
        }
    }

    /// Every unit this service waits on or requires
    pub fn dependencies(&self) -> BTreeSet<&ResourceId> {
        self.depends_on.iter().chain(self.run_after.iter()).collect()
    }

    /// Whether the service manager starts this unit by itself at boot
    pub fn starts_at_boot(&self) -> bool {
        matches!(self.activation, ActivationTrigger::Boot { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Simple,
    Notify,
    Oneshot,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Notify => "notify",
            Self::Oneshot => "oneshot",
        }
    }
}

/// What the supervisor does when the process exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    OnFailure,
    Always,
}

impl RestartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::OnFailure => "on-failure",
            Self::Always => "always",
        }
    }
}

/// What happens to a running unit when a new configuration is activated
///
/// `LeaveRunning` keeps the virtualization daemons up across
/// reconfiguration: restarting them would disrupt running guests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangePolicy {
    Restart,
    LeaveRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KillMode {
    ControlGroup,
    Process,
    Mixed,
}

impl KillMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ControlGroup => "control-group",
            Self::Process => "process",
            Self::Mixed => "mixed",
        }
    }
}

/// How a service gets started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "kebab-case")]
pub enum ActivationTrigger {
    /// Started when the target is reached during boot
    Boot { target: Target },
    /// Started by the service manager on the first connection to a socket
    FirstConnection { socket: ResourceId },
    /// Only started when another unit requires it
    Dependency,
}

/// Well-known targets provided by the service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    MultiUser,
    Sockets,
}

impl Target {
    pub fn unit_name(&self) -> &'static str {
        match self {
            Target::MultiUser => "multi-user.target",
            Target::Sockets => "sockets.target",
        }
    }

    /// Directory holding enablement links for this target
    pub fn wants_dir(&self) -> PathBuf {
        crate::layout::unit_path(&format!("{}.wants", self.unit_name()))
    }
}

/// Directories the service manager creates for a unit, relative to
/// /run, /var/log and /var/lib
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingPaths {
    pub runtime: Vec<String>,
    pub logs: Vec<String>,
    pub state: Vec<String>,
    /// Keep the runtime directories when the unit stops
    pub preserve_runtime: bool,
}

impl WorkingPaths {
    pub fn is_empty(&self) -> bool {
        self.runtime.is_empty() && self.logs.is_empty() && self.state.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Socket {
    pub listen_paths: Vec<PathBuf>,
    /// Service started on the first connection
    pub service: ResourceId,
    pub wanted_by: BTreeSet<Target>,
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalUnit {
    pub unit: String,
}

// ============================================================================
// Files
// ============================================================================

/// Whether an existing file at the destination may be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Fully generated: always rewritten
    Always,
    /// Seeded once: user edits are never clobbered
    NeverIfExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
    pub overwrite: OverwritePolicy,
    pub produced_by: Option<ResourceId>,
}

/// Where a symlink in a [`SymlinkSet`] points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum LinkSource {
    /// A single file, linked under its own name
    File { path: PathBuf },
    /// Every entry of `dir` whose name starts with `prefix`
    Matching { dir: PathBuf, prefix: String },
}

/// Symlinks created in one directory by the setup unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymlinkSet {
    pub target_dir: PathBuf,
    pub entries: Vec<LinkSource>,
    pub produced_by: Option<ResourceId>,
}

/// Default data copied into persistent storage only when absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedData {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    /// Only files with this extension are seeded
    pub extension: String,
    pub produced_by: ResourceId,
}

// ============================================================================
// Principals and policy
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalGroup {
    pub name: String,
    pub gid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalUser {
    pub name: String,
    pub uid: u32,
    /// Id of the primary group declaration
    pub group: ResourceId,
    pub group_name: String,
}

/// An executable installed with elevated ownership and mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeGrant {
    /// Name of the wrapper in `wrapper_dir`
    pub program: String,
    pub source: PathBuf,
    pub wrapper_dir: PathBuf,
    pub setuid: bool,
    pub owner: String,
    pub group: String,
    pub produced_by: ResourceId,
}

impl PrivilegeGrant {
    pub fn wrapper_path(&self) -> PathBuf {
        self.wrapper_dir.join(&self.program)
    }

    pub fn mode(&self) -> u32 {
        if self.setuid { 0o4755 } else { 0o755 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelModule {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRule {
    pub action_id: String,
    pub predicate: Predicate,
    pub result: AuthResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "kebab-case")]
pub enum Predicate {
    InGroup { group: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthResult {
    Yes,
    No,
    AuthAdmin,
}

impl AuthResult {
    /// Name of the polkit result constant
    pub fn polkit_name(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
            Self::AuthAdmin => "AUTH_ADMIN",
        }
    }
}
