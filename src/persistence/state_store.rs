//! Shared session + queue document.
//!
//! Every process that schedules work reads and mutates the same JSON
//! document. Mutations go through [`StateStore::update`], which holds an
//! exclusive advisory lock across the whole load → mutate → save cycle so
//! concurrent processes cannot lose each other's writes. Plain reads skip
//! the lock because the document is only ever replaced by atomic rename.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::models::session::Session;
use crate::models::task::QueuedTask;
use crate::{AppError, Result};

use super::atomic;
use super::lock::FileLock;

fn default_max_concurrent() -> usize {
    5
}

fn default_timeout_minutes() -> u64 {
    10
}

/// The persisted document: running sessions, backlog, and shared limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StateDocument {
    /// Sessions currently occupying a slot.
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Tasks waiting for a slot, in dequeue order.
    #[serde(default)]
    pub queue: Vec<QueuedTask>,
    /// Concurrency cap.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Minutes after which a session counts as timed out.
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            queue: Vec::new(),
            max_concurrent: default_max_concurrent(),
            timeout_minutes: default_timeout_minutes(),
        }
    }
}

impl StateDocument {
    /// Whether another session fits under the cap.
    #[must_use]
    pub fn can_spawn(&self) -> bool {
        self.sessions.len() < self.max_concurrent
    }

    /// Free slots, never negative even when sessions were force-added.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.max_concurrent.saturating_sub(self.sessions.len())
    }

    /// Session timeout as a duration.
    #[must_use]
    pub fn timeout(&self) -> TimeDelta {
        i64::try_from(self.timeout_minutes)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .unwrap_or(TimeDelta::MAX)
    }

    /// Look up a session by identifier.
    #[must_use]
    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    /// Stable sort of the queue into dequeue order.
    pub fn sort_queue(&mut self) {
        self.queue.sort_by(QueuedTask::queue_order);
    }
}

/// Handle on the shared document and its lock file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl StateStore {
    /// Create a store for the document at `path`. Nothing is touched on disk
    /// until the first operation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self {
            path,
            lock_path,
            lock_timeout,
        }
    }

    /// Create a store at the configured state path.
    #[must_use]
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.state_path(), config.lock_timeout())
    }

    /// Location of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the sidecar lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Read the current document, initializing it with defaults when it is
    /// missing or unreadable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` or `AppError::Lock` if the document cannot be
    /// read or the initial document cannot be written.
    pub fn load(&self) -> Result<StateDocument> {
        if let Some(doc) = self.read_existing()? {
            return Ok(doc);
        }

        let _lock = self.lock()?;
        // Another process may have initialized it while we waited.
        if let Some(doc) = self.read_existing()? {
            return Ok(doc);
        }
        let doc = StateDocument::default();
        atomic::write_json(&self.path, &doc)?;
        info!(path = %self.path.display(), "initialized state document");
        Ok(doc)
    }

    /// Atomically replace the document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Lock` or `AppError::Io` on failure.
    pub fn save(&self, doc: &StateDocument) -> Result<()> {
        let _lock = self.lock()?;
        atomic::write_json(&self.path, doc)
    }

    /// Run `mutate` as one critical section: lock, load, mutate, save if the
    /// document changed (or did not exist yet), unlock.
    ///
    /// If `mutate` returns an error nothing is written.
    ///
    /// # Errors
    ///
    /// Propagates the error from `mutate`, or returns `AppError::Lock` /
    /// `AppError::Io` if the critical section itself fails.
    pub fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut StateDocument) -> Result<T>,
    {
        let _lock = self.lock()?;

        let existing = self.read_existing()?;
        let fresh = existing.is_none();
        let mut doc = existing.unwrap_or_default();
        let before = doc.clone();

        let output = mutate(&mut doc)?;

        if fresh || doc != before {
            atomic::write_json(&self.path, &doc)?;
        }
        Ok(output)
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(&self.lock_path, self.lock_timeout)
    }

    /// `None` when the document is absent or does not decode.
    fn read_existing(&self) -> Result<Option<StateDocument>> {
        match atomic::read_json::<StateDocument>(&self.path) {
            Ok(doc) => Ok(Some(doc)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(AppError::Decode(msg)) => {
                warn!(path = %self.path.display(), error = %msg, "state document unreadable, resetting to defaults");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
