//! Fixed host paths, unit names and principal ids
//!
//! Everything the compiler places on the host lives at one of these
//! locations. Paths are host-absolute; emission re-roots them when a
//! staging root is used.

use std::path::{Path, PathBuf};

/// Directory name shared by runtime, log and state trees
pub const DIR_NAME: &str = "libvirt";

pub const RUNTIME_DIR: &str = "/run/libvirt";
pub const EMULATORS_DIR: &str = "/run/libvirt/emulators";
pub const HELPERS_DIR: &str = "/run/libvirt/helpers";
pub const FIRMWARE_DIR: &str = "/run/libvirt/firmware";
pub const WRAPPERS_DIR: &str = "/run/wrappers/bin";

pub const STATE_DIR: &str = "/var/lib/libvirt";

pub const LIBVIRTD_CONF: &str = "/etc/libvirt/libvirtd.conf";
pub const QEMU_CONF: &str = "/var/lib/libvirt/qemu.conf";
pub const BRIDGE_CONF: &str = "/etc/qemu/bridge.conf";
pub const POLKIT_RULES: &str = "/etc/polkit-1/rules.d/50-libvirtd.rules";
pub const SYSUSERS_CONF: &str = "/etc/sysusers.d/libvirtd.conf";
pub const MODULES_LOAD_CONF: &str = "/etc/modules-load.d/libvirtd.conf";
pub const SETUP_MANIFEST: &str = "/etc/virtforge/setup.json";
pub const UNIT_DIR: &str = "/etc/systemd/system";

pub const LIBVIRTD_SOCK: &str = "/run/libvirt/libvirt-sock";
pub const LIBVIRTD_SOCK_RO: &str = "/run/libvirt/libvirt-sock-ro";
pub const VIRTLOGD_SOCK: &str = "/run/libvirt/virtlogd-sock";
pub const VIRTLOCKD_SOCK: &str = "/run/libvirt/virtlockd-sock";

// Unit names double as resource ids
pub const SETUP_UNIT: &str = "libvirtd-config.service";
pub const DAEMON_UNIT: &str = "libvirtd.service";
pub const DAEMON_SOCKET: &str = "libvirtd.socket";
pub const VIRTLOGD_UNIT: &str = "virtlogd.service";
pub const VIRTLOGD_SOCKET: &str = "virtlogd.socket";
pub const VIRTLOCKD_UNIT: &str = "virtlockd.service";
pub const VIRTLOCKD_SOCKET: &str = "virtlockd.socket";
pub const GUESTS_UNIT: &str = "libvirt-guests.service";
pub const VSWITCH_UNIT: &str = "ovs-vswitchd.service";

/// Group allowed to manage the daemon over its local socket
pub const MANAGEMENT_GROUP: &str = "libvirtd";
pub const MANAGEMENT_GID: u32 = 67;

/// Unprivileged identity QEMU runs as when privilege drop is on
pub const QEMU_USER: &str = "qemu-libvirtd";
pub const QEMU_UID: u32 = 301;
pub const QEMU_GID: u32 = 301;

pub const MANAGE_ACTION: &str = "org.libvirt.unix.manage";
pub const BRIDGE_HELPER: &str = "qemu-bridge-helper";

/// Idle timeout handed to the daemon, from libvirt's sysconfig default
pub const DAEMON_IDLE_TIMEOUT: &str = "120";

/// Path of a unit file for the given unit name
pub fn unit_path(unit: &str) -> PathBuf {
    Path::new(UNIT_DIR).join(unit)
}

/// Re-root a host-absolute path under `root`
///
/// `/etc/qemu/bridge.conf` under `/tmp/stage` becomes
/// `/tmp/stage/etc/qemu/bridge.conf`. With root `/` the path is unchanged.
pub fn rooted(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(relative) => root.join(relative),
        Err(_) => root.join(path),
    }
}
