//! Configuration model
//!
//! [`Options`] is the raw, deserialized input. [`Configuration`] is the
//! validated, immutable value the compiler accepts; the only way to get one
//! is through [`Options::validate`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Kernel interface names: at most 15 bytes, no separators
static BRIDGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,15}$").expect("bridge name pattern"));

// ============================================================================
// Raw options
// ============================================================================

/// Raw host options as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Manage the virtualization stack at all
    pub enable: bool,

    /// Package prefixes the generated units point into
    pub packages: Packages,

    /// Appended verbatim to libvirtd.conf
    pub extra_config: String,

    /// Run QEMU child processes as root instead of the unprivileged user
    pub qemu_run_as_root: bool,

    /// Appended verbatim to qemu.conf
    pub qemu_verbatim_config: String,

    /// Expose UEFI firmware images to guests
    pub qemu_ovmf: bool,

    /// Extra command line arguments for libvirtd, in order
    pub extra_options: Vec<String>,

    /// What to do with guests that were running at shutdown: start, ignore
    pub on_boot: String,

    /// How running guests are stopped with the host: shutdown, suspend
    pub on_shutdown: String,

    /// Bridges the setuid bridge helper may attach guests to
    pub allowed_bridges: Vec<String>,

    /// Emit libvirtd.socket so the daemon starts on first connection
    pub socket_activation: bool,

    /// How long systemd waits for the daemon's readiness notification
    pub start_timeout_secs: u32,

    /// Facts about the target host
    pub host: HostOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enable: true,
            packages: Packages::default(),
            extra_config: String::new(),
            qemu_run_as_root: true,
            qemu_verbatim_config: "namespaces = []\n".to_string(),
            qemu_ovmf: true,
            extra_options: Vec::new(),
            on_boot: BootPolicy::Start.as_str().to_string(),
            on_shutdown: ShutdownPolicy::Suspend.as_str().to_string(),
            allowed_bridges: vec!["virbr0".to_string()],
            socket_activation: true,
            start_timeout_secs: 90,
            host: HostOptions::default(),
        }
    }
}

/// Package prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Packages {
    /// libvirt prefix (`sbin/libvirtd`, `libexec/libvirt_lxc`, `var/lib/libvirt`)
    pub libvirt: PathBuf,
    /// QEMU prefix (`bin/qemu-system-*`, `libexec/qemu-bridge-helper`)
    pub qemu: PathBuf,
    /// Firmware package holding `FV/<prefix>_CODE.fd` and `FV/<prefix>_VARS.fd`
    pub ovmf: PathBuf,
    /// This tool, invoked by the setup unit
    pub tool: PathBuf,
}

impl Default for Packages {
    fn default() -> Self {
        Self {
            libvirt: PathBuf::from("/usr"),
            qemu: PathBuf::from("/usr"),
            ovmf: PathBuf::from("/usr/share/OVMF"),
            tool: PathBuf::from("/usr/bin/virtforge"),
        }
    }
}

/// Host facts owned by other subsystems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostOptions {
    /// Target CPU architecture, e.g. x86_64 or aarch64
    pub arch: String,
    /// Whether polkit is enabled on the host
    pub polkit: bool,
    /// Whether Open vSwitch is managed on the host
    pub vswitch: bool,
    /// Open vSwitch prefix, added to the daemon's PATH
    pub vswitch_package: PathBuf,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            arch: "x86_64".to_string(),
            polkit: true,
            vswitch: false,
            vswitch_package: PathBuf::from("/usr"),
        }
    }
}

impl Options {
    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the options and produce an immutable configuration
    pub fn validate(self) -> Result<Configuration> {
        if !self.host.polkit {
            return Err(Error::validation(
                "host.polkit",
                "libvirtd requires polkit to be enabled on the host",
            ));
        }

        let on_boot = BootPolicy::parse(&self.on_boot)?;
        let on_shutdown = ShutdownPolicy::parse(&self.on_shutdown)?;

        for (field, path) in [
            ("packages.libvirt", &self.packages.libvirt),
            ("packages.qemu", &self.packages.qemu),
            ("packages.ovmf", &self.packages.ovmf),
            ("packages.tool", &self.packages.tool),
            ("host.vswitch_package", &self.host.vswitch_package),
        ] {
            if !path.is_absolute() {
                return Err(Error::validation(
                    field,
                    format!("path must be absolute: {}", path.display()),
                ));
            }
        }

        if self.host.arch.trim().is_empty() {
            return Err(Error::validation("host.arch", "architecture cannot be empty"));
        }

        for bridge in &self.allowed_bridges {
            if !BRIDGE_NAME.is_match(bridge) {
                return Err(Error::validation(
                    "allowed_bridges",
                    format!("'{}' is not a valid interface name", bridge),
                ));
            }
        }

        check_verbatim("extra_config", &self.extra_config)?;
        check_verbatim("qemu_verbatim_config", &self.qemu_verbatim_config)?;
        for option in &self.extra_options {
            if option.contains('\0') || option.contains('\n') {
                return Err(Error::validation(
                    "extra_options",
                    format!("argument {:?} contains a NUL byte or newline", option),
                ));
            }
        }

        if self.start_timeout_secs == 0 {
            return Err(Error::validation(
                "start_timeout_secs",
                "timeout must be greater than zero",
            ));
        }

        Ok(Configuration {
            options: self,
            on_boot,
            on_shutdown,
        })
    }
}

fn check_verbatim(field: &str, text: &str) -> Result<()> {
    if text.contains('\0') {
        return Err(Error::validation(field, "text contains a NUL byte"));
    }
    Ok(())
}

// ============================================================================
// Policies
// ============================================================================

/// What happens to previously running guests when the host boots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootPolicy {
    Start,
    Ignore,
}

impl BootPolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "start" => Ok(Self::Start),
            "ignore" => Ok(Self::Ignore),
            other => Err(Error::validation(
                "on_boot",
                format!("'{}' is not one of: start, ignore", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Ignore => "ignore",
        }
    }
}

/// How running guests are stopped when the host shuts down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    Shutdown,
    Suspend,
}

impl ShutdownPolicy {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "shutdown" => Ok(Self::Shutdown),
            "suspend" => Ok(Self::Suspend),
            other => Err(Error::validation(
                "on_shutdown",
                format!("'{}' is not one of: shutdown, suspend", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::Suspend => "suspend",
        }
    }
}

impl fmt::Display for BootPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Validated configuration
// ============================================================================

/// A validated host configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    options: Options,
    on_boot: BootPolicy,
    on_shutdown: ShutdownPolicy,
}

impl Configuration {
    /// Parse and validate in one step
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Options::from_toml_str(content)?.validate()
    }

    /// The options this configuration was validated from
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn enabled(&self) -> bool {
        self.options.enable
    }

    pub fn on_boot(&self) -> BootPolicy {
        self.on_boot
    }

    pub fn on_shutdown(&self) -> ShutdownPolicy {
        self.on_shutdown
    }

    pub fn packages(&self) -> &Packages {
        &self.options.packages
    }

    pub fn host(&self) -> &HostOptions {
        &self.options.host
    }

    pub fn qemu_run_as_root(&self) -> bool {
        self.options.qemu_run_as_root
    }

    pub fn qemu_ovmf(&self) -> bool {
        self.options.qemu_ovmf
    }

    pub fn allowed_bridges(&self) -> &[String] {
        &self.options.allowed_bridges
    }

    /// Firmware image name prefix for the target architecture
    pub fn firmware_prefix(&self) -> &'static str {
        if is_arm64(&self.options.host.arch) {
            "AAVMF"
        } else {
            "OVMF"
        }
    }

    /// Path of a firmware image inside the firmware package
    pub fn firmware_image(&self, kind: &str) -> PathBuf {
        self.options
            .packages
            .ovmf
            .join("FV")
            .join(format!("{}_{}.fd", self.firmware_prefix(), kind))
    }

    /// Path inside the libvirt package
    pub fn libvirt_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.options.packages.libvirt.join(relative)
    }

    /// Path inside the QEMU package
    pub fn qemu_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.options.packages.qemu.join(relative)
    }
}

fn is_arm64(arch: &str) -> bool {
    matches!(arch.trim(), "aarch64" | "aarch64_be" | "arm64")
}

// ============================================================================
// Tests
// ============================================================================
