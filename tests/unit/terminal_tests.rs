use super_dispatch::orchestrator::terminal::{exact_target, DEFAULT_COMMAND_TIMEOUT};
use super_dispatch::orchestrator::TmuxSessions;

#[test]
fn targets_are_exact_matches() {
    assert_eq!(exact_target("agent-t1"), "=agent-t1");
}

#[test]
fn socket_is_passed_before_the_command() {
    let tmux = TmuxSessions::new("tmux").with_socket("/tmp/dispatch.sock");

    assert_eq!(
        tmux.command_args(&["has-session", "-t", &exact_target("agent-t1")]),
        ["-S", "/tmp/dispatch.sock", "has-session", "-t", "=agent-t1"]
    );
    assert_eq!(
        TmuxSessions::new("tmux").command_args(&["kill-session", "-t", "=x"]),
        ["kill-session", "-t", "=x"]
    );
}

#[test]
fn default_timeout_is_five_seconds() {
    assert_eq!(DEFAULT_COMMAND_TIMEOUT, std::time::Duration::from_secs(5));
}

#[cfg(unix)]
mod real_processes {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use serial_test::serial;
    use super_dispatch::orchestrator::{
        HealthMonitor, SessionRegistry, TerminalSessions, TmuxSessions,
    };
    use super_dispatch::AppError;

    use super::super::support::store_in;

    /// Stops the private tmux server when the test ends, pass or fail.
    struct Server {
        socket: PathBuf,
    }

    impl Drop for Server {
        fn drop(&mut self) {
            let _ = Command::new("tmux")
                .arg("-S")
                .arg(&self.socket)
                .arg("kill-server")
                .output();
        }
    }

    fn tmux_available() -> bool {
        Command::new("tmux")
            .arg("-V")
            .output()
            .is_ok_and(|out| out.status.success())
    }

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-tmux");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    #[serial]
    fn session_name_prefix_does_not_match_longer_session() {
        if !tmux_available() {
            eprintln!("tmux not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let server = Server {
            socket: dir.path().join("tmux.sock"),
        };
        let tmux = TmuxSessions::new("tmux").with_socket(&server.socket);
        if let Err(err) = tmux.create("agent-t10") {
            eprintln!("tmux server unavailable ({err}), skipping");
            return;
        }

        assert!(tmux.exists("agent-t10").unwrap());
        assert!(!tmux.exists("agent-t1").unwrap());
        assert!(tmux.kill("agent-t1").is_err());
        assert!(tmux.exists("agent-t10").unwrap());

        let store = store_in(dir.path());
        SessionRegistry::new(Arc::clone(&store))
            .add_session("t1", "coder", 2)
            .unwrap();
        let terminals: Arc<dyn TerminalSessions> = Arc::new(tmux.clone());
        let report = HealthMonitor::new(store, terminals).health_check().unwrap();
        assert_eq!(report.dead, ["agent-t1"]);

        tmux.kill("agent-t10").unwrap();
        assert!(!tmux.exists("agent-t10").unwrap_or(false));
    }

    #[test]
    #[serial]
    fn hung_command_is_killed_after_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "#!/bin/sh\nexec sleep 5\n");
        let tmux = TmuxSessions::new(script.to_string_lossy())
            .with_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let err = tmux.exists("agent-t1").unwrap_err();

        assert!(matches!(err, AppError::Terminal(ref msg) if msg.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    #[serial]
    fn quick_command_is_not_cut_short() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "#!/bin/sh\nexit 1\n");
        let tmux = TmuxSessions::new(script.to_string_lossy())
            .with_timeout(Duration::from_secs(5));

        assert!(!tmux.exists("agent-t1").unwrap());
        assert!(tmux.kill("agent-t1").is_err());
    }
}
