//! `check` - validate a configuration and show what it derives

use anyhow::Result;
use hostplan::layout;
use std::path::Path;

use crate::Context;
use crate::config;
use crate::ui;

pub fn run(ctx: &Context, config_path: &Path) -> Result<()> {
    let (config, compilation) = config::compile(config_path)?;
    if ctx.quiet {
        return Ok(());
    }

    ui::header("Configuration");
    ui::kv("File", &config_path.display().to_string());

    if !config.enabled() {
        ui::kv("Enabled", "no");
        ui::warn("Virtualization is disabled, nothing will be emitted");
        return Ok(());
    }

    ui::kv("Enabled", "yes");
    ui::kv("Architecture", &config.host().arch);
    ui::kv(
        "Firmware",
        if config.qemu_ovmf() {
            config.firmware_prefix()
        } else {
            "disabled"
        },
    );
    ui::kv(
        "QEMU runs as",
        if config.qemu_run_as_root() {
            "root"
        } else {
            layout::QEMU_USER
        },
    );
    ui::kv("Bridges", &config.allowed_bridges().join(", "));
    ui::kv("On boot", config.on_boot().as_str());
    ui::kv("On shutdown", config.on_shutdown().as_str());
    ui::kv(
        "Activation",
        if config.options().socket_activation {
            "socket"
        } else {
            "boot"
        },
    );

    println!();
    ui::kv("Resources", &compilation.len().to_string());
    ui::kv("Fingerprint", &compilation.fingerprint()?);

    println!();
    ui::success("Configuration is valid");
    Ok(())
}
