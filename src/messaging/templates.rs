//! Canned senders layered on [`Mailbox::send`].

use crate::models::ids::BROADCAST;
use crate::models::message::{Message, MessageKind};
use crate::Result;

use super::mailbox::Mailbox;

/// Longest task excerpt placed in a subject line, in characters.
const SUBJECT_EXCERPT: usize = 50;

fn excerpt(text: &str) -> &str {
    text.char_indices()
        .nth(SUBJECT_EXCERPT)
        .map_or(text, |(end, _)| &text[..end])
}

impl Mailbox {
    /// Ask `to_agent` for help with `task`.
    ///
    /// # Errors
    ///
    /// See [`Mailbox::send`].
    pub fn request_help(&self, from_agent: &str, to_agent: &str, task: &str) -> Result<Message> {
        self.send(
            from_agent,
            to_agent,
            MessageKind::Request,
            &format!("Help needed: {}", excerpt(task)),
            task,
            None,
        )
    }

    /// Hand `task` over to `to_agent` together with its context.
    ///
    /// # Errors
    ///
    /// See [`Mailbox::send`].
    pub fn handoff_task(
        &self,
        from_agent: &str,
        to_agent: &str,
        task: &str,
        context: &str,
    ) -> Result<Message> {
        self.send(
            from_agent,
            to_agent,
            MessageKind::Handoff,
            &format!("Task handoff: {}", excerpt(task)),
            &format!("TASK: {task}\n\nCONTEXT:\n{context}"),
            None,
        )
    }

    /// Share a named payload with `to_agent`.
    ///
    /// # Errors
    ///
    /// See [`Mailbox::send`].
    pub fn share_data(
        &self,
        from_agent: &str,
        to_agent: &str,
        data_name: &str,
        data: &str,
    ) -> Result<Message> {
        self.send(
            from_agent,
            to_agent,
            MessageKind::Data,
            &format!("Data: {data_name}"),
            data,
            None,
        )
    }

    /// Announce a status update to every registered agent.
    ///
    /// # Errors
    ///
    /// See [`Mailbox::send`].
    pub fn broadcast_status(&self, from_agent: &str, status: &str) -> Result<Message> {
        self.send(
            from_agent,
            BROADCAST,
            MessageKind::Status,
            "Status update",
            status,
            None,
        )
    }
}
