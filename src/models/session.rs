//! Running agent session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status for a registered session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session occupies an execution slot.
    #[default]
    Running,
}

/// One agent execution context occupying a concurrency slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Session {
    /// Terminal session name, derived from the task identifier.
    pub session_id: String,
    /// Task this session is working on.
    pub task_id: String,
    /// Agent flavour tag (e.g. `coder`, `reviewer`).
    pub agent_type: String,
    /// Scheduling priority the task carried; lower is more urgent.
    pub priority: i64,
    /// When the session was registered.
    pub started_at: DateTime<Utc>,
    /// Current status.
    #[serde(default)]
    pub status: SessionStatus,
}

/// Derive the session identifier for a task.
#[must_use]
pub fn session_id_for(task_id: &str) -> String {
    format!("agent-{task_id}")
}

impl Session {
    /// Construct a running session for `task_id`, started now.
    #[must_use]
    pub fn new(task_id: &str, agent_type: &str, priority: i64) -> Self {
        Self::started_at(task_id, agent_type, priority, Utc::now())
    }

    /// Construct a running session with an explicit start time.
    #[must_use]
    pub fn started_at(
        task_id: &str,
        agent_type: &str,
        priority: i64,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id_for(task_id),
            task_id: task_id.to_owned(),
            agent_type: agent_type.to_owned(),
            priority,
            started_at,
            status: SessionStatus::Running,
        }
    }

    /// Time elapsed since the session started, measured at `now`.
    #[must_use]
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> chrono::TimeDelta {
        now - self.started_at
    }
}
