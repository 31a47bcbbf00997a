//! Timeout and liveness checks for registered sessions.
//!
//! Nothing here runs on a timer. Callers poll [`HealthMonitor::get_timed_out_sessions`]
//! and [`HealthMonitor::health_check`] and decide what to reconcile; the
//! registry stays the source of truth even when the terminal check fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::models::session::Session;
use crate::persistence::StateStore;
use crate::Result;

use super::registry::SessionRegistry;
use super::terminal::TerminalSessions;

/// Liveness partition of the registered session ids.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HealthReport {
    /// Sessions whose terminal session exists.
    pub healthy: Vec<String>,
    /// Sessions whose terminal session is gone or could not be checked.
    pub dead: Vec<String>,
}

/// Sessions removed by [`HealthMonitor::sweep`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    /// Removed because they ran past the timeout.
    pub timed_out: Vec<String>,
    /// Removed because their terminal session disappeared.
    pub dead: Vec<String>,
}

/// Timeout and liveness checks over the session registry.
#[derive(Clone)]
pub struct HealthMonitor {
    store: Arc<StateStore>,
    registry: SessionRegistry,
    terminals: Arc<dyn TerminalSessions>,
}

impl HealthMonitor {
    /// Create a monitor over `store`, probing sessions through `terminals`.
    #[must_use]
    pub fn new(store: Arc<StateStore>, terminals: Arc<dyn TerminalSessions>) -> Self {
        let registry = SessionRegistry::new(Arc::clone(&store));
        Self {
            store,
            registry,
            terminals,
        }
    }

    /// Sessions that have run longer than the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared document cannot be loaded.
    pub fn get_timed_out_sessions(&self) -> Result<Vec<Session>> {
        self.timed_out_sessions_at(Utc::now())
    }

    /// Sessions whose elapsed time at `now` strictly exceeds the timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared document cannot be loaded.
    pub fn timed_out_sessions_at(&self, now: DateTime<Utc>) -> Result<Vec<Session>> {
        let doc = self.store.load()?;
        let timeout = doc.timeout();
        Ok(doc
            .sessions
            .into_iter()
            .filter(|s| s.elapsed_at(now) > timeout)
            .collect())
    }

    /// Kill the terminal session (best effort) and drop it from the registry.
    ///
    /// A failed kill is logged and ignored. Returns whether the registry
    /// held the session.
    ///
    /// # Errors
    ///
    /// Returns a store error if the registry update fails.
    pub fn cleanup_session(&self, session_id: &str) -> Result<bool> {
        let _span = info_span!("cleanup_session", session_id).entered();

        if let Err(err) = self.terminals.kill(session_id) {
            warn!(%err, "terminal kill failed, removing session anyway");
        }
        self.registry.remove_session(session_id)
    }

    /// Partition registered sessions by whether their terminal session exists.
    ///
    /// Check errors count as dead. Does not modify the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared document cannot be loaded.
    pub fn health_check(&self) -> Result<HealthReport> {
        let mut report = HealthReport::default();
        for session in self.store.load()?.sessions {
            let alive = self
                .terminals
                .exists(&session.session_id)
                .unwrap_or_else(|err| {
                    warn!(session_id = %session.session_id, %err, "terminal check failed");
                    false
                });
            if alive {
                report.healthy.push(session.session_id);
            } else {
                report.dead.push(session.session_id);
            }
        }
        Ok(report)
    }

    /// Clean up every timed-out session, then remove every session whose
    /// terminal session is gone.
    ///
    /// # Errors
    ///
    /// Returns a store error if loading or any registry update fails.
    pub fn sweep(&self) -> Result<SweepReport> {
        let _span = info_span!("sweep").entered();
        let mut report = SweepReport::default();

        for session in self.get_timed_out_sessions()? {
            if self.cleanup_session(&session.session_id)? {
                report.timed_out.push(session.session_id);
            }
        }

        for session_id in self.health_check()?.dead {
            if self.registry.remove_session(&session_id)? {
                report.dead.push(session_id);
            }
        }

        info!(
            timed_out = report.timed_out.len(),
            dead = report.dead.len(),
            "sweep complete"
        );
        Ok(report)
    }
}
