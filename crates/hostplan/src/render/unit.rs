//! systemd unit files

use std::fmt::Write;

use crate::resource::{ActivationTrigger, ChangePolicy, Declaration, Service, Socket};

/// Render a unit file for a service or socket declaration
///
/// Returns `None` for declarations that are not units this crate owns.
pub fn render(declaration: &Declaration) -> Option<String> {
    if let Some(service) = declaration.as_service() {
        return Some(service_unit(&declaration.description, service));
    }
    declaration
        .as_socket()
        .map(|socket| socket_unit(&declaration.description, socket))
}

fn service_unit(description: &str, service: &Service) -> String {
    let mut out = String::from("[Unit]\n");
    line(&mut out, "Description", description);
    let requires = join_ids(service.depends_on.iter().map(|id| id.as_str()));
    if !requires.is_empty() {
        line(&mut out, "Requires", &requires);
    }
    let after = join_ids(service.run_after.iter().map(|id| id.as_str()));
    if !after.is_empty() {
        line(&mut out, "After", &after);
    }
    if service.on_change == ChangePolicy::LeaveRunning {
        line(&mut out, "X-RestartIfChanged", "false");
    }

    out.push_str("\n[Service]\n");
    line(&mut out, "Type", service.service_type.as_str());
    for (key, value) in &service.environment {
        line(&mut out, "Environment", &environment_assignment(key, value));
    }
    line(&mut out, "ExecStart", &command_line(&service.command));
    if let Some(stop) = &service.stop_command {
        line(&mut out, "ExecStop", &command_line(stop));
    }
    if service.remain_after_exit {
        line(&mut out, "RemainAfterExit", "yes");
    }
    if let Some(kill_mode) = service.kill_mode {
        line(&mut out, "KillMode", kill_mode.as_str());
    }
    line(&mut out, "Restart", service.restart.as_str());
    if let Some(secs) = service.start_timeout_secs {
        line(&mut out, "TimeoutStartSec", &secs.to_string());
    }

    let paths = &service.working_paths;
    if !paths.runtime.is_empty() {
        line(&mut out, "RuntimeDirectory", &paths.runtime.join(" "));
        if paths.preserve_runtime {
            line(&mut out, "RuntimeDirectoryPreserve", "yes");
        }
    }
    if !paths.logs.is_empty() {
        line(&mut out, "LogsDirectory", &paths.logs.join(" "));
    }
    if !paths.state.is_empty() {
        line(&mut out, "StateDirectory", &paths.state.join(" "));
    }

    if let ActivationTrigger::Boot { target } = &service.activation {
        out.push_str("\n[Install]\n");
        line(&mut out, "WantedBy", target.unit_name());
    }
    out
}

fn socket_unit(description: &str, socket: &Socket) -> String {
    let mut out = String::from("[Unit]\n");
    line(&mut out, "Description", description);

    out.push_str("\n[Socket]\n");
    for path in &socket.listen_paths {
        line(&mut out, "ListenStream", &path.to_string_lossy());
    }
    if let Some(mode) = socket.mode {
        line(&mut out, "SocketMode", &format!("{:04o}", mode));
    }
    line(&mut out, "Service", socket.service.as_str());

    if !socket.wanted_by.is_empty() {
        out.push_str("\n[Install]\n");
        let targets = join_ids(socket.wanted_by.iter().map(|t| t.unit_name()));
        line(&mut out, "WantedBy", &targets);
    }
    out
}

fn line(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{}={}", key, value);
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    ids.collect::<Vec<_>>().join(" ")
}

/// `Environment=` value: the whole assignment quoted, with `\`, `"` and the
/// `%` specifier escaped
pub fn environment_assignment(key: &str, value: &str) -> String {
    format!("\"{}={}\"", key, escape(value))
}

/// Command line for `ExecStart=` and friends
///
/// Words containing whitespace or quotes are double-quoted. Variable
/// references like `$LIBVIRTD_ARGS` stay bare so systemd splits them.
pub fn command_line(words: &[String]) -> String {
    words
        .iter()
        .map(|word| {
            let needs_quotes = word.is_empty()
                || word
                    .chars()
                    .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\');
            if needs_quotes {
                format!("\"{}\"", escape(word))
            } else {
                word.replace('%', "%%")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '%' => escaped.push_str("%%"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceKind, RestartPolicy, ServiceType, Target};
    use std::collections::BTreeSet;

    #[test]
    fn test_environment_escaping() {
        assert_eq!(environment_assignment("A", "plain"), "\"A=plain\"");
        assert_eq!(
            environment_assignment("ARGS", r#"--x 'a "b"' c\d"#),
            r#""ARGS=--x 'a \"b\"' c\\d""#
        );
        assert_eq!(environment_assignment("P", "50%"), "\"P=50%%\"");
    }

    #[test]
    fn test_command_line_keeps_variables_bare() {
        let words = vec!["/usr/sbin/libvirtd".to_string(), "$LIBVIRTD_ARGS".to_string()];
        assert_eq!(command_line(&words), "/usr/sbin/libvirtd $LIBVIRTD_ARGS");

        let words = vec!["/bin/echo".to_string(), "two words".to_string()];
        assert_eq!(command_line(&words), "/bin/echo \"two words\"");
    }

    #[test]
    fn test_service_unit() {
        let mut service = Service::new(ServiceType::Notify, vec!["/usr/sbin/d".into()]);
        service.depends_on.insert("setup.service".into());
        service.run_after.insert("setup.service".into());
        service.restart = RestartPolicy::OnFailure;
        service.on_change = ChangePolicy::LeaveRunning;
        service.activation = ActivationTrigger::Boot {
            target: Target::MultiUser,
        };
        let decl = Declaration::new("d.service", "Daemon", ResourceKind::Service(service));

        let text = render(&decl).unwrap();
        assert!(text.starts_with("[Unit]\nDescription=Daemon\n"));
        assert!(text.contains("Requires=setup.service\n"));
        assert!(text.contains("After=setup.service\n"));
        assert!(text.contains("X-RestartIfChanged=false\n"));
        assert!(text.contains("Type=notify\n"));
        assert!(text.contains("Restart=on-failure\n"));
        assert!(text.ends_with("[Install]\nWantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_dependency_service_has_no_install_section() {
        let service = Service::new(ServiceType::Oneshot, vec!["/bin/true".into()]);
        let decl = Declaration::new("s.service", "Setup", ResourceKind::Service(service));
        let text = render(&decl).unwrap();
        assert!(!text.contains("[Install]"));
        assert!(!text.contains("X-RestartIfChanged"));
    }

    #[test]
    fn test_socket_unit() {
        let socket = Socket {
            listen_paths: vec!["/run/a-sock".into(), "/run/a-sock-ro".into()],
            service: "a.service".into(),
            wanted_by: BTreeSet::from([Target::Sockets]),
            mode: Some(0o666),
        };
        let decl = Declaration::new("a.socket", "A socket", ResourceKind::Socket(socket));
        let text = render(&decl).unwrap();

        assert!(text.contains("ListenStream=/run/a-sock\nListenStream=/run/a-sock-ro\n"));
        assert!(text.contains("SocketMode=0666\n"));
        assert!(text.contains("Service=a.service\n"));
        assert!(text.ends_with("WantedBy=sockets.target\n"));
    }
}
