//! Resource compiler
//!
//! Turns a validated [`Configuration`] into the ordered declarations that
//! make up a libvirt/QEMU host. Each group of resources comes from a small
//! function over the configuration; conditional resources are plain
//! `if`/`Option` composition, nothing is registered dynamically.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::Configuration;
use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::layout;
use crate::render;
use crate::resource::{
    ActivationTrigger, AuthResult, AuthorizationRule, ChangePolicy, Declaration, ExternalUnit,
    GeneratedFile, KernelModule, KillMode, LinkSource, OverwritePolicy, Predicate,
    PrincipalGroup, PrincipalUser, PrivilegeGrant, ResourceId, ResourceKind, RestartPolicy,
    SeedData, Service, ServiceType, Socket, SymlinkSet, Target, WorkingPaths,
};

/// The result of one compiler run
#[derive(Debug)]
pub struct Compilation {
    declarations: Vec<Declaration>,
    graph: DependencyGraph,
}

impl Compilation {
    /// Declarations in compiler order
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Declarations in dependency order
    pub fn ordered(&self) -> Vec<&Declaration> {
        self.graph
            .order()
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Declaration> {
        self.declarations.iter().find(|d| &d.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Declarations materialized at runtime by the given setup unit
    pub fn produced_by<'a>(&'a self, unit: &'a ResourceId) -> impl Iterator<Item = &'a Declaration> {
        self.declarations
            .iter()
            .filter(move |d| d.produced_by() == Some(unit))
    }

    /// Stable content hash of the compiled declarations
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        for declaration in &self.declarations {
            hasher.update(&serde_json::to_vec(declaration)?);
            hasher.update(b"\n");
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Compile a configuration into declarations
///
/// Fails before returning anything if the result would contain a duplicate
/// id, an unresolved reference, or a cycle.
pub fn compile(config: &Configuration) -> Result<Compilation> {
    let declarations = if config.enabled() {
        declarations(config)
    } else {
        log::info!("libvirtd disabled, nothing to compile");
        Vec::new()
    };

    let graph = DependencyGraph::build(&declarations)?;
    log::debug!("compiled {} declarations", declarations.len());

    Ok(Compilation {
        declarations,
        graph,
    })
}

fn declarations(config: &Configuration) -> Vec<Declaration> {
    let mut out = Vec::new();

    out.extend(principals());
    out.push(kernel_module("tun"));
    out.push(bridge_helper_grant());
    out.push(libvirtd_conf(config));
    out.push(bridge_conf(config));
    out.push(management_rule());

    out.push(setup_service(config));
    out.extend(seed_data(config));
    out.push(qemu_conf(config));
    out.push(emulator_links(config));
    out.push(helper_links(config));
    out.extend(firmware_links(config));

    out.extend(vswitch_unit(config));
    out.push(daemon_service(config));
    out.extend(daemon_socket(config));

    out.extend(companion(
        layout::VIRTLOGD_UNIT,
        layout::VIRTLOGD_SOCKET,
        "Virtual machine log manager",
        config.libvirt_path("sbin/virtlogd"),
        layout::VIRTLOGD_SOCK,
    ));
    out.extend(companion(
        layout::VIRTLOCKD_UNIT,
        layout::VIRTLOCKD_SOCKET,
        "Virtual machine lock manager",
        config.libvirt_path("sbin/virtlockd"),
        layout::VIRTLOCKD_SOCK,
    ));

    out.push(guests_service(config));
    out
}

// ============================================================================
// Always-present host resources
// ============================================================================

fn group_id(name: &str) -> ResourceId {
    ResourceId::new(format!("group:{}", name))
}

fn file_id(path: &str) -> ResourceId {
    ResourceId::new(format!("file:{}", path))
}

fn setup_id() -> ResourceId {
    ResourceId::from(layout::SETUP_UNIT)
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn principals() -> Vec<Declaration> {
    vec![
        Declaration::new(
            group_id(layout::MANAGEMENT_GROUP),
            "Members may manage libvirtd",
            ResourceKind::PrincipalGroup(PrincipalGroup {
                name: layout::MANAGEMENT_GROUP.to_string(),
                gid: layout::MANAGEMENT_GID,
            }),
        ),
        Declaration::new(
            group_id(layout::QEMU_USER),
            "Primary group of the QEMU user",
            ResourceKind::PrincipalGroup(PrincipalGroup {
                name: layout::QEMU_USER.to_string(),
                gid: layout::QEMU_GID,
            }),
        ),
        Declaration::new(
            format!("user:{}", layout::QEMU_USER),
            "Unprivileged identity for QEMU processes",
            ResourceKind::PrincipalUser(PrincipalUser {
                name: layout::QEMU_USER.to_string(),
                uid: layout::QEMU_UID,
                group: group_id(layout::QEMU_USER),
                group_name: layout::QEMU_USER.to_string(),
            }),
        ),
    ]
}

fn kernel_module(name: &str) -> Declaration {
    Declaration::new(
        format!("module:{}", name),
        format!("Load the {} kernel module at boot", name),
        ResourceKind::KernelModule(KernelModule {
            name: name.to_string(),
        }),
    )
}

fn bridge_helper_grant() -> Declaration {
    Declaration::new(
        format!("grant:{}", layout::BRIDGE_HELPER),
        "Setuid wrapper for the QEMU bridge helper",
        ResourceKind::PrivilegeGrant(PrivilegeGrant {
            program: layout::BRIDGE_HELPER.to_string(),
            source: Path::new(layout::HELPERS_DIR).join(layout::BRIDGE_HELPER),
            wrapper_dir: PathBuf::from(layout::WRAPPERS_DIR),
            setuid: true,
            owner: "root".to_string(),
            group: "root".to_string(),
            produced_by: setup_id(),
        }),
    )
}

fn libvirtd_conf(config: &Configuration) -> Declaration {
    Declaration::new(
        file_id(layout::LIBVIRTD_CONF),
        "libvirtd configuration",
        ResourceKind::GeneratedFile(GeneratedFile {
            path: PathBuf::from(layout::LIBVIRTD_CONF),
            content: render::files::libvirtd_conf(&config.options().extra_config),
            mode: 0o644,
            overwrite: OverwritePolicy::Always,
            produced_by: None,
        }),
    )
}

fn bridge_conf(config: &Configuration) -> Declaration {
    Declaration::new(
        file_id(layout::BRIDGE_CONF),
        "Bridges the QEMU bridge helper may use",
        ResourceKind::GeneratedFile(GeneratedFile {
            path: PathBuf::from(layout::BRIDGE_CONF),
            content: render::files::bridge_conf(config.allowed_bridges()),
            mode: 0o644,
            overwrite: OverwritePolicy::Always,
            produced_by: None,
        }),
    )
}

fn management_rule() -> Declaration {
    Declaration::new(
        format!("rule:{}", layout::MANAGE_ACTION),
        "Let the libvirtd group manage the daemon over its local socket",
        ResourceKind::AuthorizationRule(AuthorizationRule {
            action_id: layout::MANAGE_ACTION.to_string(),
            predicate: Predicate::InGroup {
                group: layout::MANAGEMENT_GROUP.to_string(),
            },
            result: AuthResult::Yes,
        }),
    )
}

// ============================================================================
// Setup unit and its products
// ============================================================================

fn setup_service(config: &Configuration) -> Declaration {
    let dir = layout::DIR_NAME;
    let sub = |names: &[&str]| -> Vec<String> {
        std::iter::once(dir.to_string())
            .chain(names.iter().map(|n| format!("{}/{}", dir, n)))
            .collect()
    };

    let mut service = Service::new(
        ServiceType::Oneshot,
        vec![
            path_str(&config.packages().tool),
            "setup".to_string(),
            "--manifest".to_string(),
            layout::SETUP_MANIFEST.to_string(),
        ],
    );
    service.working_paths = WorkingPaths {
        runtime: sub(&["emulators", "helpers", "firmware"]),
        logs: sub(&["qemu"]),
        state: sub(&["dnsmasq"]),
        preserve_runtime: true,
    };

    Declaration::new(
        setup_id(),
        "Libvirt Virtual Machine Management Daemon - configuration",
        ResourceKind::Service(service),
    )
}

fn seed_data(config: &Configuration) -> Vec<Declaration> {
    ["qemu/networks", "qemu/networks/autostart", "nwfilter"]
        .into_iter()
        .map(|sub| {
            let source_dir = config.libvirt_path("var/lib/libvirt").join(sub);
            let dest_dir = Path::new(layout::STATE_DIR).join(sub);
            Declaration::new(
                format!("seed:{}", dest_dir.display()),
                format!("Default definitions in {}", dest_dir.display()),
                ResourceKind::SeedData(SeedData {
                    source_dir,
                    dest_dir,
                    extension: "xml".to_string(),
                    produced_by: setup_id(),
                }),
            )
        })
        .collect()
}

fn qemu_conf(config: &Configuration) -> Declaration {
    let nvram = config.qemu_ovmf().then(|| {
        let firmware = Path::new(layout::FIRMWARE_DIR);
        let prefix = config.firmware_prefix();
        (
            firmware.join(format!("{}_CODE.fd", prefix)),
            firmware.join(format!("{}_VARS.fd", prefix)),
        )
    });
    let drop_to = (!config.qemu_run_as_root()).then_some(layout::QEMU_USER);

    Declaration::new(
        file_id(layout::QEMU_CONF),
        "QEMU driver configuration",
        ResourceKind::GeneratedFile(GeneratedFile {
            path: PathBuf::from(layout::QEMU_CONF),
            content: render::files::qemu_conf(
                nvram.as_ref().map(|(code, vars)| (code.as_path(), vars.as_path())),
                drop_to,
                &config.options().qemu_verbatim_config,
            ),
            mode: 0o644,
            overwrite: OverwritePolicy::Always,
            produced_by: Some(setup_id()),
        }),
    )
}

fn link_set(dir: &str, description: &str, entries: Vec<LinkSource>) -> Declaration {
    Declaration::new(
        format!("symlinks:{}", dir),
        description,
        ResourceKind::SymlinkSet(SymlinkSet {
            target_dir: PathBuf::from(dir),
            entries,
            produced_by: Some(setup_id()),
        }),
    )
}

fn emulator_links(config: &Configuration) -> Declaration {
    link_set(
        layout::EMULATORS_DIR,
        "Stable paths for emulators used in domain definitions",
        vec![
            LinkSource::File {
                path: config.libvirt_path("libexec/libvirt_lxc"),
            },
            LinkSource::File {
                path: config.qemu_path("bin/qemu-kvm"),
            },
            LinkSource::Matching {
                dir: config.qemu_path("bin"),
                prefix: "qemu-system-".to_string(),
            },
        ],
    )
}

fn helper_links(config: &Configuration) -> Declaration {
    link_set(
        layout::HELPERS_DIR,
        "Stable paths for QEMU helpers",
        vec![
            LinkSource::File {
                path: config.qemu_path("libexec").join(layout::BRIDGE_HELPER),
            },
            LinkSource::File {
                path: config.qemu_path("bin/qemu-pr-helper"),
            },
        ],
    )
}

fn firmware_links(config: &Configuration) -> Option<Declaration> {
    if !config.qemu_ovmf() {
        return None;
    }
    Some(link_set(
        layout::FIRMWARE_DIR,
        "UEFI firmware code and variable images",
        vec![
            LinkSource::File {
                path: config.firmware_image("CODE"),
            },
            LinkSource::File {
                path: config.firmware_image("VARS"),
            },
        ],
    ))
}

// ============================================================================
// Daemons
// ============================================================================

fn vswitch_unit(config: &Configuration) -> Option<Declaration> {
    config.host().vswitch.then(|| {
        Declaration::new(
            layout::VSWITCH_UNIT,
            "Open vSwitch daemon",
            ResourceKind::ExternalUnit(ExternalUnit {
                unit: layout::VSWITCH_UNIT.to_string(),
            }),
        )
    })
}

fn daemon_service(config: &Configuration) -> Declaration {
    let mut args = vec![
        "--config".to_string(),
        layout::LIBVIRTD_CONF.to_string(),
        "--timeout".to_string(),
        layout::DAEMON_IDLE_TIMEOUT.to_string(),
    ];
    args.extend(config.options().extra_options.iter().cloned());

    // libvirtd shells out to qemu-img and, with vswitch, ovs-vsctl
    let mut path = vec![path_str(&config.qemu_path("bin"))];
    if config.host().vswitch {
        path.push(path_str(&config.host().vswitch_package.join("bin")));
    }

    let mut service = Service::new(
        ServiceType::Notify,
        vec![
            path_str(&config.libvirt_path("sbin/libvirtd")),
            "$LIBVIRTD_ARGS".to_string(),
        ],
    );
    service.depends_on.insert(setup_id());
    service.run_after.insert(setup_id());
    if config.host().vswitch {
        service.run_after.insert(layout::VSWITCH_UNIT.into());
    }
    service.environment = BTreeMap::from([
        ("LIBVIRTD_ARGS".to_string(), shell_words::join(&args)),
        ("PATH".to_string(), path.join(":")),
    ]);
    service.kill_mode = Some(KillMode::Process);
    service.restart = RestartPolicy::No;
    service.on_change = ChangePolicy::LeaveRunning;
    service.start_timeout_secs = Some(config.options().start_timeout_secs);
    service.activation = if config.options().socket_activation {
        ActivationTrigger::FirstConnection {
            socket: layout::DAEMON_SOCKET.into(),
        }
    } else {
        ActivationTrigger::Boot {
            target: Target::MultiUser,
        }
    };

    Declaration::new(
        layout::DAEMON_UNIT,
        "Virtualization daemon",
        ResourceKind::Service(service),
    )
}

fn daemon_socket(config: &Configuration) -> Option<Declaration> {
    if !config.options().socket_activation {
        return None;
    }
    Some(Declaration::new(
        layout::DAEMON_SOCKET,
        "Libvirt local socket",
        ResourceKind::Socket(Socket {
            listen_paths: vec![
                PathBuf::from(layout::LIBVIRTD_SOCK),
                PathBuf::from(layout::LIBVIRTD_SOCK_RO),
            ],
            service: layout::DAEMON_UNIT.into(),
            wanted_by: BTreeSet::from([Target::Sockets]),
            mode: Some(0o666),
        }),
    ))
}

/// A socket-activated helper daemon: the socket is enabled at boot, the
/// service only starts on the first connection
fn companion(
    unit: &str,
    socket_unit: &str,
    description: &str,
    binary: PathBuf,
    listen: &str,
) -> [Declaration; 2] {
    let mut service = Service::new(ServiceType::Simple, vec![path_str(&binary)]);
    service.restart = RestartPolicy::OnFailure;
    service.on_change = ChangePolicy::LeaveRunning;
    service.activation = ActivationTrigger::FirstConnection {
        socket: socket_unit.into(),
    };

    [
        Declaration::new(unit, description, ResourceKind::Service(service)),
        Declaration::new(
            socket_unit,
            format!("{} socket", description),
            ResourceKind::Socket(Socket {
                listen_paths: vec![PathBuf::from(listen)],
                service: unit.into(),
                wanted_by: BTreeSet::from([Target::Sockets]),
                mode: None,
            }),
        ),
    ]
}

fn guests_service(config: &Configuration) -> Declaration {
    let script = path_str(&config.libvirt_path("libexec/libvirt-guests.sh"));

    let mut service = Service::new(ServiceType::Oneshot, vec![script.clone(), "start".to_string()]);
    service.stop_command = Some(vec![script, "stop".to_string()]);
    service.remain_after_exit = true;
    service.activation = ActivationTrigger::Boot {
        target: Target::MultiUser,
    };
    // Restarting would run the stop action against every running guest
    service.on_change = ChangePolicy::LeaveRunning;
    service.environment = BTreeMap::from([
        ("ON_BOOT".to_string(), config.on_boot().as_str().to_string()),
        (
            "ON_SHUTDOWN".to_string(),
            config.on_shutdown().as_str().to_string(),
        ),
    ]);

    Declaration::new(
        layout::GUESTS_UNIT,
        "Suspend/resume running guests on host shutdown/boot",
        ResourceKind::Service(service),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    fn compile_with(edit: impl FnOnce(&mut Options)) -> Compilation {
        let mut options = Options::default();
        edit(&mut options);
        compile(&options.validate().unwrap()).unwrap()
    }

    fn file_content<'a>(compilation: &'a Compilation, path: &str) -> &'a str {
        match &compilation.get(&file_id(path)).unwrap().kind {
            ResourceKind::GeneratedFile(file) => &file.content,
            other => panic!("not a file: {other:?}"),
        }
    }

    fn service<'a>(compilation: &'a Compilation, unit: &str) -> &'a Service {
        compilation
            .get(&unit.into())
            .and_then(|d| d.as_service())
            .unwrap()
    }

    #[test]
    fn test_deterministic() {
        let a = compile_with(|_| {});
        let b = compile_with(|_| {});
        assert_eq!(a.declarations(), b.declarations());
        assert_eq!(a.graph().order(), b.graph().order());
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let c = compile_with(|o| o.on_boot = "ignore".into());
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn test_disabled_compiles_to_nothing() {
        let compilation = compile_with(|o| o.enable = false);
        assert!(compilation.is_empty());
    }

    #[test]
    fn test_daemon_ordering() {
        let compilation = compile_with(|_| {});
        let daemon = service(&compilation, layout::DAEMON_UNIT);
        let setup = ResourceId::from(layout::SETUP_UNIT);

        assert!(daemon.depends_on.contains(&setup));
        assert!(daemon.run_after.contains(&setup));
        assert!(!daemon.dependencies().contains(&ResourceId::from(layout::VSWITCH_UNIT)));
        assert!(compilation.graph().precedes(&setup, &layout::DAEMON_UNIT.into()));
        assert!(compilation.get(&layout::VSWITCH_UNIT.into()).is_none());
    }

    #[test]
    fn test_daemon_after_vswitch() {
        let compilation = compile_with(|o| o.host.vswitch = true);
        let daemon = service(&compilation, layout::DAEMON_UNIT);
        let vswitch = ResourceId::from(layout::VSWITCH_UNIT);

        assert!(daemon.dependencies().contains(&vswitch));
        assert!(daemon.dependencies().contains(&ResourceId::from(layout::SETUP_UNIT)));
        assert!(compilation.graph().precedes(&vswitch, &layout::DAEMON_UNIT.into()));
        assert!(daemon.environment["PATH"].ends_with("/usr/bin"));
        assert!(daemon.environment["PATH"].contains(':'));
    }

    #[test]
    fn test_daemon_policy() {
        let compilation = compile_with(|o| {
            o.extra_options = vec!["--listen".into(), "two words".into()];
        });
        let daemon = service(&compilation, layout::DAEMON_UNIT);

        assert_eq!(daemon.restart, RestartPolicy::No);
        assert_eq!(daemon.on_change, ChangePolicy::LeaveRunning);
        assert_eq!(daemon.kill_mode, Some(KillMode::Process));
        assert_eq!(daemon.start_timeout_secs, Some(90));
        assert_eq!(
            daemon.environment["LIBVIRTD_ARGS"],
            "--config /etc/libvirt/libvirtd.conf --timeout 120 --listen 'two words'"
        );
    }

    #[test]
    fn test_daemon_activation() {
        let compilation = compile_with(|_| {});
        let daemon = service(&compilation, layout::DAEMON_UNIT);
        assert!(!daemon.starts_at_boot());
        let socket = compilation
            .get(&layout::DAEMON_SOCKET.into())
            .and_then(|d| d.as_socket())
            .unwrap();
        assert!(socket.wanted_by.contains(&Target::Sockets));

        let compilation = compile_with(|o| o.socket_activation = false);
        assert!(compilation.get(&layout::DAEMON_SOCKET.into()).is_none());
        assert!(service(&compilation, layout::DAEMON_UNIT).starts_at_boot());
    }

    #[test]
    fn test_companions_are_socket_activated() {
        let compilation = compile_with(|_| {});

        for (unit, socket_unit) in [
            (layout::VIRTLOGD_UNIT, layout::VIRTLOGD_SOCKET),
            (layout::VIRTLOCKD_UNIT, layout::VIRTLOCKD_SOCKET),
        ] {
            let svc = service(&compilation, unit);
            assert!(!svc.starts_at_boot(), "{unit} must not start at boot");
            assert_eq!(
                svc.activation,
                ActivationTrigger::FirstConnection {
                    socket: socket_unit.into()
                }
            );
            assert!(svc.dependencies().is_empty(), "{unit} is independent of libvirtd");

            let socket = compilation
                .get(&socket_unit.into())
                .and_then(|d| d.as_socket())
                .unwrap();
            assert_eq!(socket.service, ResourceId::from(unit));
            assert_eq!(socket.wanted_by, BTreeSet::from([Target::Sockets]));
        }
    }

    #[test]
    fn test_guests_service() {
        let compilation = compile_with(|o| {
            o.on_boot = "ignore".into();
            o.on_shutdown = "shutdown".into();
        });
        let guests = service(&compilation, layout::GUESTS_UNIT);

        assert_eq!(
            guests.activation,
            ActivationTrigger::Boot {
                target: Target::MultiUser
            }
        );
        assert!(guests.dependencies().is_empty());
        assert_eq!(guests.on_change, ChangePolicy::LeaveRunning);
        assert_eq!(guests.environment["ON_BOOT"], "ignore");
        assert_eq!(guests.environment["ON_SHUTDOWN"], "shutdown");
        assert!(!compilation.graph().precedes(&layout::SETUP_UNIT.into(), &layout::GUESTS_UNIT.into()));
    }

    #[test]
    fn test_bridge_conf_lines() {
        let compilation = compile_with(|o| {
            o.allowed_bridges = vec!["virbr0".into(), "br1".into()];
        });
        let content = file_content(&compilation, layout::BRIDGE_CONF);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, ["allow virbr0", "allow br1"]);
    }

    #[test]
    fn test_firmware_links_follow_arch() {
        let links = |compilation: &Compilation| -> Vec<LinkSource> {
            match &compilation
                .get(&format!("symlinks:{}", layout::FIRMWARE_DIR).into())
                .unwrap()
                .kind
            {
                ResourceKind::SymlinkSet(set) => set.entries.clone(),
                other => panic!("unexpected {other:?}"),
            }
        };

        let arm = compile_with(|o| o.host.arch = "aarch64".into());
        for entry in links(&arm) {
            let LinkSource::File { path } = entry else {
                panic!("firmware links are plain files");
            };
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("AAVMF_"), "{name}");
        }
        assert!(file_content(&arm, layout::QEMU_CONF).contains("/run/libvirt/firmware/AAVMF_CODE.fd"));

        let x86 = compile_with(|_| {});
        for entry in links(&x86) {
            let LinkSource::File { path } = entry else {
                panic!("firmware links are plain files");
            };
            assert!(path.ends_with("FV/OVMF_CODE.fd") || path.ends_with("FV/OVMF_VARS.fd"));
        }
    }

    #[test]
    fn test_uefi_disabled() {
        let compilation = compile_with(|o| o.qemu_ovmf = false);
        assert!(
            compilation
                .get(&format!("symlinks:{}", layout::FIRMWARE_DIR).into())
                .is_none()
        );
        assert!(!file_content(&compilation, layout::QEMU_CONF).contains("nvram"));
    }

    #[test]
    fn test_privilege_drop() {
        let root = compile_with(|_| {});
        assert!(!file_content(&root, layout::QEMU_CONF).contains("user ="));

        let dropped = compile_with(|o| o.qemu_run_as_root = false);
        let content = file_content(&dropped, layout::QEMU_CONF);
        assert!(content.contains("user = \"qemu-libvirtd\""));
        assert!(content.contains("group = \"qemu-libvirtd\""));
    }

    #[test]
    fn test_setup_products() {
        let compilation = compile_with(|_| {});
        let setup = ResourceId::from(layout::SETUP_UNIT);
        let products: Vec<&str> = compilation
            .produced_by(&setup)
            .map(|d| d.kind_name())
            .collect();

        assert_eq!(
            products,
            ["grant", "seed", "seed", "seed", "file", "symlinks", "symlinks", "symlinks"]
        );
        for product in compilation.produced_by(&setup) {
            assert!(compilation.graph().precedes(&setup, &product.id));
        }
    }

    #[test]
    fn test_always_present_resources() {
        let compilation = compile_with(|_| {});
        for id in [
            "group:libvirtd",
            "group:qemu-libvirtd",
            "user:qemu-libvirtd",
            "module:tun",
            "grant:qemu-bridge-helper",
            "rule:org.libvirt.unix.manage",
            "file:/etc/libvirt/libvirtd.conf",
            "file:/etc/qemu/bridge.conf",
        ] {
            assert!(compilation.get(&id.into()).is_some(), "missing {id}");
        }
    }

    #[test]
    fn test_seed_data_never_overwrites() {
        let compilation = compile_with(|_| {});
        let seeds: Vec<&SeedData> = compilation
            .declarations()
            .iter()
            .filter_map(|d| match &d.kind {
                ResourceKind::SeedData(seed) => Some(seed),
                _ => None,
            })
            .collect();
        assert_eq!(seeds.len(), 3);
        assert!(seeds.iter().all(|s| s.dest_dir.starts_with(layout::STATE_DIR)));
    }
}
