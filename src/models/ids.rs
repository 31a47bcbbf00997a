//! Identifier validation.
//!
//! Agent, task and message identifiers end up as directory names, file names
//! and terminal session names, so they are checked before any I/O happens.

use std::sync::LazyLock;

use regex::Regex;

use crate::{AppError, Result};

/// Recipient sentinel that fans a message out to every registered inbox.
pub const BROADCAST: &str = "all";

#[allow(clippy::expect_used)] // Literal patterns only.
fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("identifier pattern compiles")
}

static AGENT_ID: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$"));

// tmux treats `.` and `:` as target separators.
static TASK_ID: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$"));

static MESSAGE_ID: LazyLock<Regex> = LazyLock::new(|| pattern(r"^msg-[A-Za-z0-9-]{1,64}$"));

/// Validate an agent identifier used as an inbox or outbox directory name.
///
/// # Errors
///
/// Returns `AppError::InvalidId` for empty, reserved, or path-unsafe names.
pub fn validate_agent_id(agent_id: &str) -> Result<()> {
    if agent_id == BROADCAST {
        return Err(AppError::InvalidId(format!(
            "`{BROADCAST}` is reserved for broadcast"
        )));
    }
    if AGENT_ID.is_match(agent_id) {
        Ok(())
    } else {
        Err(AppError::InvalidId(format!("agent id `{agent_id}`")))
    }
}

/// Validate a recipient: either a valid agent id or [`BROADCAST`].
///
/// # Errors
///
/// Returns `AppError::InvalidId` if the recipient is neither.
pub fn validate_recipient(to_agent: &str) -> Result<()> {
    if to_agent == BROADCAST {
        Ok(())
    } else {
        validate_agent_id(to_agent)
    }
}

/// Validate a task identifier, which also names the terminal session.
///
/// # Errors
///
/// Returns `AppError::InvalidId` if the identifier is unusable.
pub fn validate_task_id(task_id: &str) -> Result<()> {
    if TASK_ID.is_match(task_id) {
        Ok(())
    } else {
        Err(AppError::InvalidId(format!("task id `{task_id}`")))
    }
}

/// Validate a message identifier before it is turned into a file name.
///
/// # Errors
///
/// Returns `AppError::InvalidId` if the identifier is malformed.
pub fn validate_message_id(msg_id: &str) -> Result<()> {
    if MESSAGE_ID.is_match(msg_id) {
        Ok(())
    } else {
        Err(AppError::InvalidId(format!("message id `{msg_id}`")))
    }
}
