//! Session registry: which agent sessions currently hold a slot.
//!
//! Capacity is advisory here. [`SessionRegistry::add_session`] does not
//! consult [`SessionRegistry::can_spawn`]; callers gate on it themselves so
//! an operator can still force a session in.

use std::sync::Arc;

use tracing::{info, info_span};

use crate::models::ids::validate_task_id;
use crate::models::session::Session;
use crate::persistence::StateStore;
use crate::{AppError, Result};

/// Registry of running sessions backed by the shared document.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    store: Arc<StateStore>,
}

impl SessionRegistry {
    /// Create a registry over `store`.
    #[must_use]
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Whether the number of sessions is below the concurrency cap.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared document cannot be loaded.
    pub fn can_spawn(&self) -> Result<bool> {
        Ok(self.store.load()?.can_spawn())
    }

    /// Register a running session for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for an unusable task id,
    /// `AppError::AlreadyExists` if the derived session id is already
    /// registered, or a store error.
    pub fn add_session(&self, task_id: &str, agent_type: &str, priority: i64) -> Result<Session> {
        let _span = info_span!("add_session", task_id, agent_type, priority).entered();
        validate_task_id(task_id)?;

        let session = Session::new(task_id, agent_type, priority);
        self.store.update(|doc| {
            if doc.session(&session.session_id).is_some() {
                return Err(AppError::AlreadyExists(format!(
                    "session {}",
                    session.session_id
                )));
            }
            doc.sessions.push(session.clone());
            Ok(())
        })?;

        info!(session_id = %session.session_id, "session registered");
        Ok(session)
    }

    /// Remove a session. Returns `false` when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns a store error if the critical section fails.
    pub fn remove_session(&self, session_id: &str) -> Result<bool> {
        let _span = info_span!("remove_session", session_id).entered();

        let removed = self.store.update(|doc| {
            let before = doc.sessions.len();
            doc.sessions.retain(|s| s.session_id != session_id);
            Ok(doc.sessions.len() < before)
        })?;

        if removed {
            info!("session removed");
        }
        Ok(removed)
    }

    /// Snapshot of the registered sessions in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared document cannot be loaded.
    pub fn get_active_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.store.load()?.sessions)
    }
}
