//! Inter-agent message model.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::BROADCAST;
use crate::AppError;

/// Closed set of message kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Ask another agent to do something.
    Request,
    /// Reply to a request.
    Response,
    /// Announcement to every agent.
    Broadcast,
    /// Transfer of task ownership.
    Handoff,
    /// Progress or state update.
    Status,
    /// Shared results or payloads.
    Data,
}

impl MessageKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Request,
        Self::Response,
        Self::Broadcast,
        Self::Handoff,
        Self::Status,
        Self::Data,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Broadcast => "broadcast",
            Self::Handoff => "handoff",
            Self::Status => "status",
            Self::Data => "data",
        }
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::Mailbox(format!("unknown message kind: {s}")))
    }
}

/// One unit of inter-agent communication. Every physical copy (inbox or
/// outbox) carries the full record, including its own read flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Identifier shared by all copies of the same send.
    pub id: String,
    /// Sender agent.
    pub from_agent: String,
    /// Recipient agent, or `all` for a broadcast.
    pub to_agent: String,
    /// Message kind.
    pub msg_type: MessageKind,
    /// Short subject line.
    pub subject: String,
    /// Body.
    pub content: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the message this one answers.
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Whether the holder of this copy has read it.
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Construct an unread message stamped now with a fresh identifier.
    #[must_use]
    pub fn new(
        from_agent: &str,
        to_agent: &str,
        msg_type: MessageKind,
        subject: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: new_message_id(timestamp),
            from_agent: from_agent.to_owned(),
            to_agent: to_agent.to_owned(),
            msg_type,
            subject: subject.to_owned(),
            content: content.to_owned(),
            timestamp,
            reply_to: reply_to.map(str::to_owned),
            read: false,
        }
    }

    /// Whether the message was addressed to every inbox.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.to_agent == BROADCAST
    }

    /// File name of a physical copy of this message.
    #[must_use]
    pub fn file_name(&self) -> String {
        message_file_name(&self.id)
    }
}

/// File name used for the copy of message `msg_id`.
#[must_use]
pub fn message_file_name(msg_id: &str) -> String {
    format!("{msg_id}.json")
}

/// `msg-<yyyymmddHHMMSSffffff>-<8 hex>`; lexical order follows creation time
/// on a single clock.
fn new_message_id(timestamp: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "msg-{}-{}",
        timestamp.format("%Y%m%d%H%M%S%6f"),
        &suffix[..8]
    )
}
