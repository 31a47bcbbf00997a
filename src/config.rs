//! Dispatch configuration: home directory resolution and `config.toml` parsing.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{AppError, Result};

/// Environment variable that overrides the home directory.
pub const HOME_ENV: &str = "SUPER_DISPATCH_HOME";

/// Directory name used under the user's home when no override is given.
const DEFAULT_HOME_DIR: &str = ".super-dispatch";

/// Name of the optional configuration file inside the home directory.
pub const CONFIG_FILE: &str = "config.toml";

fn default_tmux_binary() -> String {
    "tmux".into()
}

fn default_priority() -> i64 {
    2
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_tmux_timeout_ms() -> u64 {
    5000
}

/// Tunables read from `config.toml`. Every field has a default so the file
/// may be absent or partial.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Terminal multiplexer executable.
    #[serde(default = "default_tmux_binary")]
    pub tmux_binary: String,
    /// Priority used when a caller does not supply one.
    #[serde(default = "default_priority")]
    pub default_priority: i64,
    /// Upper bound on waiting for another process's critical section.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Upper bound on a single `tmux` invocation.
    #[serde(default = "default_tmux_timeout_ms")]
    pub tmux_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tmux_binary: default_tmux_binary(),
            default_priority: default_priority(),
            lock_timeout_ms: default_lock_timeout_ms(),
            tmux_timeout_ms: default_tmux_timeout_ms(),
        }
    }
}

/// Resolved configuration: where the durable state lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Root directory holding `sessions/` and `messages/`.
    pub home: PathBuf,
    /// Settings loaded from `config.toml` (or defaults).
    pub settings: Settings,
}

impl DispatchConfig {
    /// Resolve the home directory and load `config.toml` from it when present.
    ///
    /// Resolution order: explicit `home_override`, then [`HOME_ENV`], then
    /// `~/.super-dispatch`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no home directory can be determined or
    /// the configuration file is unreadable or invalid.
    pub fn load(home_override: Option<PathBuf>) -> Result<Self> {
        let home = resolve_home(home_override)?;
        let config_path = home.join(CONFIG_FILE);

        let settings = if config_path.is_file() {
            let raw = fs::read_to_string(&config_path).map_err(|err| {
                AppError::Config(format!(
                    "failed to read {}: {err}",
                    config_path.display()
                ))
            })?;
            Settings::from_toml_str(&raw)?
        } else {
            debug!(path = %config_path.display(), "no config file, using defaults");
            Settings::default()
        };

        Ok(Self { home, settings })
    }

    /// Build a configuration rooted at `home` with default settings.
    #[must_use]
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            settings: Settings::default(),
        }
    }

    /// Path of the shared session + queue document.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.home.join("sessions").join("active.json")
    }

    /// Root of the mailbox tree (`inbox/` and `outbox/`).
    #[must_use]
    pub fn messages_dir(&self) -> PathBuf {
        self.home.join("messages")
    }

    /// Home directory.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Lock acquisition bound as a [`Duration`].
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.lock_timeout_ms)
    }
}

impl Settings {
    /// Parse settings from a TOML string and validate them.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Self = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.tmux_binary.trim().is_empty() {
            return Err(AppError::Config("tmux_binary must not be empty".into()));
        }
        if self.lock_timeout_ms == 0 {
            return Err(AppError::Config(
                "lock_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.tmux_timeout_ms == 0 {
            return Err(AppError::Config(
                "tmux_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_home(home_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(home) = home_override {
        return Ok(home);
    }

    match env::var_os(HOME_ENV) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => dirs::home_dir()
            .map(|dir| dir.join(DEFAULT_HOME_DIR))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "cannot determine home directory; set {HOME_ENV}"
                ))
            }),
    }
}
