//! Priority task queue with preemption.
//!
//! The queue is kept in dequeue order inside the shared document: sorted by
//! `(priority, queued_at)` after every normal enqueue. A preempting task is
//! put at index 0 without sorting, so it is always the next one out. Two
//! back-to-back preemptions therefore come out last-in first-out.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span};

use crate::models::ids::validate_task_id;
use crate::models::session::session_id_for;
use crate::models::task::QueuedTask;
use crate::persistence::{StateDocument, StateStore};
use crate::{AppError, Result};

/// Queue and capacity summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueStatus {
    /// Tasks waiting.
    pub queued: usize,
    /// Sessions running.
    pub active: usize,
    /// Slots left under the cap.
    pub available_slots: usize,
    /// Task that [`TaskQueue::dequeue_next`] would return.
    pub next_task: Option<String>,
}

/// Backlog of tasks backed by the shared document.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    store: Arc<StateStore>,
}

impl TaskQueue {
    /// Create a queue over `store`.
    #[must_use]
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Enqueue a task and restore priority order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for an unusable task id,
    /// `AppError::AlreadyExists` if the task is already queued or running,
    /// or a store error.
    pub fn queue_task(
        &self,
        task_id: &str,
        agent_type: &str,
        priority: i64,
        prompt: &str,
    ) -> Result<QueuedTask> {
        let _span = info_span!("queue_task", task_id, agent_type, priority).entered();
        validate_task_id(task_id)?;

        let task = QueuedTask::new(task_id, agent_type, priority, prompt);
        let depth = self.store.update(|doc| {
            ensure_new(doc, task_id)?;
            doc.queue.push(task.clone());
            doc.sort_queue();
            Ok(doc.queue.len())
        })?;

        info!(depth, "task queued");
        Ok(task)
    }

    /// Put a priority-0 task at the head of the queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for an unusable task id,
    /// `AppError::AlreadyExists` if the task is already queued or running,
    /// or a store error.
    pub fn preempt_queue(&self, task_id: &str, agent_type: &str, prompt: &str) -> Result<QueuedTask> {
        let _span = info_span!("preempt_queue", task_id, agent_type).entered();
        validate_task_id(task_id)?;

        let task = QueuedTask::preemptive(task_id, agent_type, prompt);
        self.store.update(|doc| {
            ensure_new(doc, task_id)?;
            doc.queue.insert(0, task.clone());
            Ok(())
        })?;

        info!("task preempted to queue head");
        Ok(task)
    }

    /// Pop the head of the queue.
    ///
    /// # Errors
    ///
    /// Returns a store error if the critical section fails.
    pub fn dequeue_next(&self) -> Result<Option<QueuedTask>> {
        let _span = info_span!("dequeue_next").entered();

        let task = self.store.update(|doc| {
            if doc.queue.is_empty() {
                Ok(None)
            } else {
                Ok(Some(doc.queue.remove(0)))
            }
        })?;

        if let Some(ref task) = task {
            info!(task_id = %task.task_id, "task dequeued");
        }
        Ok(task)
    }

    /// Snapshot of queue and capacity counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared document cannot be loaded.
    pub fn get_queue_status(&self) -> Result<QueueStatus> {
        let doc = self.store.load()?;
        Ok(QueueStatus {
            queued: doc.queue.len(),
            active: doc.sessions.len(),
            available_slots: doc.available_slots(),
            next_task: doc.queue.first().map(|t| t.task_id.clone()),
        })
    }

    /// Snapshot of the queue in dequeue order.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared document cannot be loaded.
    pub fn list_queue(&self) -> Result<Vec<QueuedTask>> {
        Ok(self.store.load()?.queue)
    }
}

/// A task id may be queued once and must not name a running session.
fn ensure_new(doc: &StateDocument, task_id: &str) -> Result<()> {
    if doc.queue.iter().any(|t| t.task_id == task_id) {
        return Err(AppError::AlreadyExists(format!("queued task {task_id}")));
    }
    let session_id = session_id_for(task_id);
    if doc.session(&session_id).is_some() {
        return Err(AppError::AlreadyExists(format!("session {session_id}")));
    }
    Ok(())
}
