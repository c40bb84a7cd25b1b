//! Contents of generated configuration files

use std::fmt::Write;
use std::path::Path;

use crate::resource::{AuthorizationRule, KernelModule, Predicate, PrincipalGroup, PrincipalUser};

/// `/etc/libvirt/libvirtd.conf`: polkit authentication on both sockets,
/// then the user's extra configuration verbatim
pub fn libvirtd_conf(extra_config: &str) -> String {
    let mut out = String::from("auth_unix_ro = \"polkit\"\nauth_unix_rw = \"polkit\"\n");
    push_verbatim(&mut out, extra_config);
    out
}

/// `qemu.conf` written by the setup unit
///
/// `nvram` pairs firmware code and variable images; `drop_to` is the
/// unprivileged user and group QEMU switches to.
pub fn qemu_conf(nvram: Option<(&Path, &Path)>, drop_to: Option<&str>, verbatim: &str) -> String {
    let mut out = String::new();
    if let Some((code, vars)) = nvram {
        let _ = writeln!(
            out,
            "nvram = [ \"{}:{}\" ]",
            code.display(),
            vars.display()
        );
    }
    if let Some(identity) = drop_to {
        let _ = writeln!(out, "user = \"{}\"", identity);
        let _ = writeln!(out, "group = \"{}\"", identity);
    }
    push_verbatim(&mut out, verbatim);
    out
}

/// `/etc/qemu/bridge.conf`: one `allow` line per bridge, in order
pub fn bridge_conf(bridges: &[String]) -> String {
    bridges.iter().map(|b| format!("allow {}\n", b)).collect()
}

/// polkit rules granting each action to its predicate
pub fn polkit_rules(rules: &[&AuthorizationRule]) -> String {
    let mut out = String::new();
    for rule in rules {
        let condition = match &rule.predicate {
            Predicate::InGroup { group } => format!("subject.isInGroup(\"{}\")", group),
        };
        let _ = write!(
            out,
            "polkit.addRule(function(action, subject) {{\n  \
             if (action.id == \"{}\" && {}) {{\n    \
             return polkit.Result.{};\n  \
             }}\n\
             }});\n",
            rule.action_id,
            condition,
            rule.result.polkit_name()
        );
    }
    out
}

/// sysusers.d entries, groups first so users can name them
pub fn sysusers(groups: &[&PrincipalGroup], users: &[&PrincipalUser]) -> String {
    let mut out = String::new();
    for group in groups {
        let _ = writeln!(out, "g {} {}", group.name, group.gid);
    }
    for user in users {
        let _ = writeln!(out, "u {} {}:{}", user.name, user.uid, user.group_name);
    }
    out
}

/// modules-load.d: one module per line
pub fn modules_load(modules: &[&KernelModule]) -> String {
    modules.iter().map(|m| format!("{}\n", m.name)).collect()
}

fn push_verbatim(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}
