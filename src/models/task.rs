//! Queued task model.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority assigned to preempting tasks.
pub const PREEMPT_PRIORITY: i64 = 0;

/// Work waiting for a free execution slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueuedTask {
    /// Task identifier; becomes the session identifier once started.
    pub task_id: String,
    /// Agent flavour that should pick the task up.
    pub agent_type: String,
    /// Lower value is more urgent.
    pub priority: i64,
    /// Enqueue time, used to break priority ties.
    pub queued_at: DateTime<Utc>,
    /// Free-form instructions handed to the agent.
    #[serde(default)]
    pub prompt: String,
}

impl QueuedTask {
    /// Construct a task enqueued now.
    #[must_use]
    pub fn new(task_id: &str, agent_type: &str, priority: i64, prompt: &str) -> Self {
        Self {
            task_id: task_id.to_owned(),
            agent_type: agent_type.to_owned(),
            priority,
            queued_at: Utc::now(),
            prompt: prompt.to_owned(),
        }
    }

    /// Construct a task carrying [`PREEMPT_PRIORITY`].
    #[must_use]
    pub fn preemptive(task_id: &str, agent_type: &str, prompt: &str) -> Self {
        Self::new(task_id, agent_type, PREEMPT_PRIORITY, prompt)
    }

    /// Queue order: priority ascending, then enqueue time ascending.
    #[must_use]
    pub fn queue_order(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.queued_at.cmp(&other.queued_at))
    }
}
