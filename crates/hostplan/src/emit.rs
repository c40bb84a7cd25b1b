//! Emission planning
//!
//! Maps a [`Compilation`] onto the concrete files and links a host needs.
//! Declarations produced by the setup unit are not emitted directly; they
//! are serialized into a [`SetupManifest`] that the setup unit reads when it
//! runs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::Compilation;
use crate::error::{Error, Result};
use crate::layout;
use crate::render;
use crate::resource::{
    ActivationTrigger, Declaration, OverwritePolicy, ResourceId, ResourceKind,
};

/// One file or link to place on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Host-absolute destination
    pub path: PathBuf,
    /// Declarations this artifact was derived from
    pub sources: Vec<ResourceId>,
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactKind {
    File {
        content: String,
        mode: u32,
        overwrite: OverwritePolicy,
    },
    /// Symlink to a host-absolute target, which need not exist yet
    Link { target: PathBuf },
}

impl Artifact {
    fn file(path: impl Into<PathBuf>, sources: Vec<ResourceId>, content: String) -> Self {
        Self {
            path: path.into(),
            sources,
            kind: ArtifactKind::File {
                content,
                mode: 0o644,
                overwrite: OverwritePolicy::Always,
            },
        }
    }

    fn link(path: PathBuf, source: &ResourceId, target: PathBuf) -> Self {
        Self {
            path,
            sources: vec![source.clone()],
            kind: ArtifactKind::Link { target },
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, ArtifactKind::Link { .. })
    }
}

/// Work handed to the setup unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupManifest {
    /// The oneshot unit that runs this manifest
    pub unit: ResourceId,
    /// Products in dependency order
    pub declarations: Vec<Declaration>,
}

impl SetupManifest {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Plan every artifact for a compilation
///
/// An empty compilation plans nothing.
pub fn plan(compilation: &Compilation) -> Result<Vec<Artifact>> {
    let ordered = compilation.ordered();
    let mut artifacts = Vec::new();

    let mut groups = Vec::new();
    let mut users = Vec::new();
    let mut modules = Vec::new();
    let mut rules = Vec::new();
    let mut principal_ids = Vec::new();
    let mut module_ids = Vec::new();
    let mut rule_ids = Vec::new();
    let mut setup_products = Vec::new();

    for declaration in &ordered {
        if let Some(producer) = declaration.produced_by() {
            if producer.as_str() != layout::SETUP_UNIT {
                return Err(Error::validation(
                    declaration.id.as_str(),
                    format!("unsupported setup unit {}", producer),
                ));
            }
            setup_products.push((*declaration).clone());
            continue;
        }

        match &declaration.kind {
            ResourceKind::Service(service) => {
                artifacts.push(unit_artifact(declaration)?);
                if let ActivationTrigger::Boot { target } = &service.activation {
                    artifacts.push(wants_link(declaration, target.wants_dir()));
                }
            }
            ResourceKind::Socket(socket) => {
                artifacts.push(unit_artifact(declaration)?);
                for target in &socket.wanted_by {
                    artifacts.push(wants_link(declaration, target.wants_dir()));
                }
            }
            ResourceKind::GeneratedFile(file) => artifacts.push(Artifact {
                path: file.path.clone(),
                sources: vec![declaration.id.clone()],
                kind: ArtifactKind::File {
                    content: file.content.clone(),
                    mode: file.mode,
                    overwrite: file.overwrite,
                },
            }),
            ResourceKind::PrincipalGroup(group) => {
                groups.push(group);
                principal_ids.push(declaration.id.clone());
            }
            ResourceKind::PrincipalUser(user) => {
                users.push(user);
                principal_ids.push(declaration.id.clone());
            }
            ResourceKind::KernelModule(module) => {
                modules.push(module);
                module_ids.push(declaration.id.clone());
            }
            ResourceKind::AuthorizationRule(rule) => {
                rules.push(rule);
                rule_ids.push(declaration.id.clone());
            }
            ResourceKind::ExternalUnit(_) => {}
            // Always carry a producer; handled above
            ResourceKind::SymlinkSet(_)
            | ResourceKind::SeedData(_)
            | ResourceKind::PrivilegeGrant(_) => {}
        }
    }

    if !principal_ids.is_empty() {
        artifacts.push(Artifact::file(
            layout::SYSUSERS_CONF,
            principal_ids,
            render::files::sysusers(&groups, &users),
        ));
    }
    if !module_ids.is_empty() {
        artifacts.push(Artifact::file(
            layout::MODULES_LOAD_CONF,
            module_ids,
            render::files::modules_load(&modules),
        ));
    }
    if !rule_ids.is_empty() {
        artifacts.push(Artifact::file(
            layout::POLKIT_RULES,
            rule_ids,
            render::files::polkit_rules(&rules),
        ));
    }

    if !setup_products.is_empty() {
        let unit = ResourceId::from(layout::SETUP_UNIT);
        let manifest = SetupManifest {
            unit: unit.clone(),
            declarations: setup_products,
        };
        artifacts.push(Artifact::file(
            layout::SETUP_MANIFEST,
            vec![unit],
            manifest.to_json()?,
        ));
    }

    log::debug!("planned {} artifacts", artifacts.len());
    Ok(artifacts)
}

fn unit_artifact(declaration: &Declaration) -> Result<Artifact> {
    let content = render::unit::render(declaration).ok_or_else(|| {
        Error::validation(declaration.id.as_str(), "declaration is not a unit")
    })?;
    Ok(Artifact::file(
        layout::unit_path(declaration.id.as_str()),
        vec![declaration.id.clone()],
        content,
    ))
}

fn wants_link(declaration: &Declaration, wants_dir: PathBuf) -> Artifact {
    Artifact::link(
        wants_dir.join(declaration.id.as_str()),
        &declaration.id,
        layout::unit_path(declaration.id.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::config::Options;

    fn plan_with(edit: impl FnOnce(&mut Options)) -> Vec<Artifact> {
        let mut options = Options::default();
        edit(&mut options);
        plan(&compile(&options.validate().unwrap()).unwrap()).unwrap()
    }

    fn find<'a>(artifacts: &'a [Artifact], path: &str) -> Option<&'a Artifact> {
        artifacts.iter().find(|a| a.path == Path::new(path))
    }

    fn content<'a>(artifacts: &'a [Artifact], path: &str) -> &'a str {
        match &find(artifacts, path).unwrap().kind {
            ArtifactKind::File { content, .. } => content,
            ArtifactKind::Link { .. } => panic!("{path} is a link"),
        }
    }

    #[test]
    fn test_disabled_plans_nothing() {
        assert!(plan_with(|o| o.enable = false).is_empty());
    }

    #[test]
    fn test_paths_are_unique() {
        let artifacts = plan_with(|o| o.host.vswitch = true);
        let mut paths: Vec<&PathBuf> = artifacts.iter().map(|a| &a.path).collect();
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    fn test_unit_files_and_links() {
        let artifacts = plan_with(|_| {});

        for unit in [
            layout::SETUP_UNIT,
            layout::DAEMON_UNIT,
            layout::DAEMON_SOCKET,
            layout::VIRTLOGD_UNIT,
            layout::VIRTLOGD_SOCKET,
            layout::VIRTLOCKD_UNIT,
            layout::VIRTLOCKD_SOCKET,
            layout::GUESTS_UNIT,
        ] {
            assert!(
                find(&artifacts, &format!("/etc/systemd/system/{unit}")).is_some(),
                "missing unit {unit}"
            );
        }

        let link = find(
            &artifacts,
            "/etc/systemd/system/sockets.target.wants/libvirtd.socket",
        )
        .unwrap();
        assert_eq!(
            link.kind,
            ArtifactKind::Link {
                target: PathBuf::from("/etc/systemd/system/libvirtd.socket")
            }
        );
        assert!(
            find(
                &artifacts,
                "/etc/systemd/system/multi-user.target.wants/libvirt-guests.service"
            )
            .is_some()
        );
        // Socket-activated daemons are not enabled directly
        for unit in [layout::DAEMON_UNIT, layout::VIRTLOGD_UNIT, layout::VIRTLOCKD_UNIT] {
            assert!(
                !artifacts
                    .iter()
                    .any(|a| a.is_link() && a.path.ends_with(unit)),
                "{unit} must not be enabled"
            );
        }
    }

    #[test]
    fn test_daemon_enabled_without_socket_activation() {
        let artifacts = plan_with(|o| o.socket_activation = false);
        assert!(
            find(
                &artifacts,
                "/etc/systemd/system/multi-user.target.wants/libvirtd.service"
            )
            .is_some()
        );
        assert!(find(&artifacts, "/etc/systemd/system/libvirtd.socket").is_none());
    }

    #[test]
    fn test_external_unit_not_emitted() {
        let artifacts = plan_with(|o| o.host.vswitch = true);
        assert!(find(&artifacts, "/etc/systemd/system/ovs-vswitchd.service").is_none());
        assert!(content(&artifacts, "/etc/systemd/system/libvirtd.service")
            .contains("After=libvirtd-config.service ovs-vswitchd.service\n"));
    }

    #[test]
    fn test_aggregated_files() {
        let artifacts = plan_with(|_| {});
        assert_eq!(
            content(&artifacts, layout::SYSUSERS_CONF),
            "g libvirtd 67\ng qemu-libvirtd 301\nu qemu-libvirtd 301:qemu-libvirtd\n"
        );
        assert_eq!(content(&artifacts, layout::MODULES_LOAD_CONF), "tun\n");
        assert!(content(&artifacts, layout::POLKIT_RULES).contains("subject.isInGroup(\"libvirtd\")"));
        assert_eq!(content(&artifacts, layout::BRIDGE_CONF), "allow virbr0\n");
    }

    #[test]
    fn test_setup_products_go_to_manifest() {
        let artifacts = plan_with(|_| {});
        assert!(find(&artifacts, layout::QEMU_CONF).is_none());

        let manifest = SetupManifest::from_json(content(&artifacts, layout::SETUP_MANIFEST)).unwrap();
        assert_eq!(manifest.unit.as_str(), layout::SETUP_UNIT);
        assert!(
            manifest
                .declarations
                .iter()
                .any(|d| d.id.as_str() == "file:/var/lib/libvirt/qemu.conf")
        );
        assert!(
            manifest
                .declarations
                .iter()
                .all(|d| d.produced_by().map(ResourceId::as_str) == Some(layout::SETUP_UNIT))
        );
    }

    #[test]
    fn test_setup_unit_invokes_manifest() {
        let artifacts = plan_with(|_| {});
        let unit = content(&artifacts, "/etc/systemd/system/libvirtd-config.service");
        assert!(unit.contains("ExecStart=/usr/bin/virtforge setup --manifest /etc/virtforge/setup.json\n"));
        assert!(unit.contains(
            "RuntimeDirectory=libvirt libvirt/emulators libvirt/helpers libvirt/firmware\n"
        ));
        assert!(unit.contains("RuntimeDirectoryPreserve=yes\n"));
        assert!(unit.contains("LogsDirectory=libvirt libvirt/qemu\n"));
        assert!(unit.contains("StateDirectory=libvirt libvirt/dnsmasq\n"));
        assert!(unit.contains("Type=oneshot\n"));
    }

    #[test]
    fn test_guests_unit_survives_reconfiguration() {
        let artifacts = plan_with(|_| {});
        let unit = content(&artifacts, "/etc/systemd/system/libvirt-guests.service");
        assert!(unit.contains("ExecStop=/usr/libexec/libvirt-guests.sh stop\n"));
        assert!(unit.contains("X-RestartIfChanged=false\n"));
    }

    #[test]
    fn test_daemon_unit_text() {
        let artifacts = plan_with(|_| {});
        let unit = content(&artifacts, "/etc/systemd/system/libvirtd.service");
        assert!(unit.contains("Requires=libvirtd-config.service\n"));
        assert!(unit.contains(
            "Environment=\"LIBVIRTD_ARGS=--config /etc/libvirt/libvirtd.conf --timeout 120\"\n"
        ));
        assert!(unit.contains("ExecStart=/usr/sbin/libvirtd $LIBVIRTD_ARGS\n"));
        assert!(unit.contains("KillMode=process\n"));
        assert!(unit.contains("Restart=no\n"));
        assert!(unit.contains("X-RestartIfChanged=false\n"));
        assert!(unit.contains("TimeoutStartSec=90\n"));
        assert!(!unit.contains("[Install]"));
    }
}
