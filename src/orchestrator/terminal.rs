//! Terminal multiplexer adapter.
//!
//! Agents run inside named terminal sessions. The core only needs to
//! create, kill, and test those sessions; [`TmuxSessions`] does that by
//! shelling out to `tmux`.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::{AppError, Result};

/// Upper bound on a single `tmux` invocation when none is configured.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Named execution sessions hosted by a terminal multiplexer.
pub trait TerminalSessions: Send + Sync {
    /// Start a detached session called `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Terminal` if the session could not be created.
    fn create(&self, name: &str) -> Result<()>;

    /// Kill the session called `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Terminal` if the kill request failed.
    fn kill(&self, name: &str) -> Result<()>;

    /// Whether a session called `name` is alive.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Terminal` if the multiplexer could not be queried.
    fn exists(&self, name: &str) -> Result<bool>;
}

/// Target string that matches only the session named exactly `name`.
///
/// A bare `-t name` falls back to prefix and pattern matching, so
/// `agent-t1` would resolve to `agent-t10` once `agent-t1` is gone.
#[must_use]
pub fn exact_target(name: &str) -> String {
    format!("={name}")
}

/// `tmux`-backed [`TerminalSessions`].
#[derive(Debug, Clone)]
pub struct TmuxSessions {
    binary: String,
    socket: Option<PathBuf>,
    timeout: Duration,
}

impl TmuxSessions {
    /// Use the given `tmux` executable on its default server.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            socket: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Use the executable and command timeout named in the configuration.
    #[must_use]
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.settings.tmux_binary.clone())
            .with_timeout(Duration::from_millis(config.settings.tmux_timeout_ms))
    }

    /// Talk to the server listening on `socket` (`tmux -S`).
    #[must_use]
    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    /// Give up on a `tmux` invocation after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argument list for `tmux` invocation `args`, including the
    /// server socket selection.
    #[must_use]
    pub fn command_args(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if let Some(socket) = &self.socket {
            argv.push("-S".to_owned());
            argv.push(socket.to_string_lossy().into_owned());
        }
        argv.extend(args.iter().map(|a| (*a).to_owned()));
        argv
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        let argv = self.command_args(args);
        debug!(binary = %self.binary, ?argv, "running terminal command");

        let mut child = Command::new(&self.binary)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| AppError::Terminal(format!("failed to run {}: {err}", self.binary)))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => {
                    return child.wait_with_output().map_err(|err| {
                        AppError::Terminal(format!("failed to collect {} output: {err}", self.binary))
                    });
                }
                Ok(None) if Instant::now() >= deadline => {
                    if let Err(err) = child.kill() {
                        warn!(%err, "failed to kill stuck terminal command");
                    }
                    if let Err(err) = child.wait() {
                        warn!(%err, "failed to reap stuck terminal command");
                    }
                    return Err(AppError::Terminal(format!(
                        "{} {} timed out after {}ms",
                        self.binary,
                        args.first().copied().unwrap_or_default(),
                        self.timeout.as_millis()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    return Err(AppError::Terminal(format!(
                        "failed to wait for {}: {err}",
                        self.binary
                    )));
                }
            }
        }
    }
}

impl TerminalSessions for TmuxSessions {
    // `-s` takes a literal name and tmux refuses exact duplicates.
    fn create(&self, name: &str) -> Result<()> {
        let output = self.run(&["new-session", "-d", "-s", name])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(AppError::Terminal(format!(
                "new-session {name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn kill(&self, name: &str) -> Result<()> {
        let output = self.run(&["kill-session", "-t", &exact_target(name)])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(AppError::Terminal(format!(
                "kill-session {name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .run(&["has-session", "-t", &exact_target(name)])?
            .status
            .success())
    }
}
