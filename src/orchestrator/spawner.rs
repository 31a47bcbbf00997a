//! Start the next queued task in a fresh terminal session.
//!
//! Checking capacity, claiming a queued task, and registering its session
//! happen in one critical section, so two processes racing for the last
//! slot cannot both win it.

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::models::ids::validate_task_id;
use crate::models::session::{session_id_for, Session};
use crate::models::task::QueuedTask;
use crate::persistence::StateStore;
use crate::Result;

use super::terminal::TerminalSessions;

/// A task that has been moved from the queue into a running session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Launch {
    /// Newly registered session.
    pub session: Session,
    /// Task the session runs, including its prompt.
    pub task: QueuedTask,
}

/// Claim the first queued task that can run, if a slot is free, and open
/// its terminal session.
///
/// Returns `None` when the cap is reached or nothing in the queue can run.
/// A task whose session is still registered (force-added after it was
/// queued) stays where it is and the scan moves past it. If the terminal
/// session cannot be created the claim is rolled back: the session is
/// dropped and the task returns to its old queue position.
///
/// # Errors
///
/// Returns `AppError::Terminal` if the terminal session could not be
/// created, or a store error.
pub fn spawn_next(store: &StateStore, terminals: &dyn TerminalSessions) -> Result<Option<Launch>> {
    let _span = info_span!("spawn_next").entered();

    let claimed = store.update(|doc| {
        if !doc.can_spawn() {
            return Ok(None);
        }
        let runnable = doc
            .queue
            .iter()
            .position(|t| doc.session(&session_id_for(&t.task_id)).is_none());
        if runnable != Some(0) && !doc.queue.is_empty() {
            warn!(
                head = %doc.queue[0].task_id,
                "queue head already has a running session, skipping it"
            );
        }
        let Some(index) = runnable else {
            return Ok(None);
        };
        validate_task_id(&doc.queue[index].task_id)?;

        let task = doc.queue.remove(index);
        let session = Session::new(&task.task_id, &task.agent_type, task.priority);
        doc.sessions.push(session.clone());
        Ok(Some((index, Launch { session, task })))
    })?;

    let Some((index, launch)) = claimed else {
        debug!("nothing to spawn");
        return Ok(None);
    };

    if let Err(err) = terminals.create(&launch.session.session_id) {
        warn!(session_id = %launch.session.session_id, %err, "terminal session failed, requeueing task");
        store.update(|doc| {
            doc.sessions
                .retain(|s| s.session_id != launch.session.session_id);
            let index = index.min(doc.queue.len());
            doc.queue.insert(index, launch.task.clone());
            Ok(())
        })?;
        return Err(err);
    }

    info!(
        session_id = %launch.session.session_id,
        agent_type = %launch.task.agent_type,
        "task started"
    );
    Ok(Some(launch))
}
