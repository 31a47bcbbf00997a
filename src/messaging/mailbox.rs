//! File-backed agent mailboxes.
//!
//! Layout under the messages root:
//!
//! ```text
//! inbox/<agent>/<msg-id>.json    one copy per recipient
//! outbox/<agent>/<msg-id>.json   one copy per send, kept for the sender
//! ```
//!
//! An agent is addressable once its inbox directory exists. Sends only ever
//! create new, uniquely named files, so they need no lock. Marking a copy
//! read rewrites that one file under the inbox's lock file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::config::DispatchConfig;
use crate::models::ids::{validate_agent_id, validate_message_id, validate_recipient};
use crate::models::message::{message_file_name, Message, MessageKind};
use crate::persistence::atomic;
use crate::persistence::lock::FileLock;
use crate::{AppError, Result};

/// Lock file serializing read-flag updates inside one inbox.
const INBOX_LOCK: &str = ".lock";

/// Aggregate counters over every inbox.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MailboxStats {
    /// Message copies across all inboxes.
    pub total_messages: usize,
    /// Copies not yet marked read.
    pub unread_messages: usize,
    /// Registered agents.
    pub agents_with_inbox: usize,
}

/// Inboxes and outboxes rooted at one messages directory.
#[derive(Debug, Clone)]
pub struct Mailbox {
    inbox_root: PathBuf,
    outbox_root: PathBuf,
    lock_timeout: Duration,
}

impl Mailbox {
    /// Open the mailbox tree at `root`, creating `inbox/` and `outbox/`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directories cannot be created.
    pub fn open(root: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self> {
        let root = root.into();
        let mailbox = Self {
            inbox_root: root.join("inbox"),
            outbox_root: root.join("outbox"),
            lock_timeout,
        };
        create_dir(&mailbox.inbox_root)?;
        create_dir(&mailbox.outbox_root)?;
        Ok(mailbox)
    }

    /// Open the mailbox tree at the configured messages directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directories cannot be created.
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        Self::open(config.messages_dir(), config.lock_timeout())
    }

    /// Inbox directory of `agent_id`.
    #[must_use]
    pub fn inbox_dir(&self, agent_id: &str) -> PathBuf {
        self.inbox_root.join(agent_id)
    }

    /// Outbox directory of `agent_id`.
    #[must_use]
    pub fn outbox_dir(&self, agent_id: &str) -> PathBuf {
        self.outbox_root.join(agent_id)
    }

    /// Make `agent_id` addressable. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for an unusable id, or `AppError::Io`.
    pub fn register(&self, agent_id: &str) -> Result<bool> {
        validate_agent_id(agent_id)?;
        let dir = self.inbox_dir(agent_id);
        if dir.is_dir() {
            return Ok(false);
        }
        create_dir(&dir)?;
        info!(agent_id, "agent inbox registered");
        Ok(true)
    }

    /// Whether `agent_id` has an inbox.
    #[must_use]
    pub fn is_registered(&self, agent_id: &str) -> bool {
        validate_agent_id(agent_id).is_ok() && self.inbox_dir(agent_id).is_dir()
    }

    /// Registered agents, sorted by id. Directories whose names are not
    /// valid agent ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the inbox root cannot be listed.
    pub fn registered_agents(&self) -> Result<Vec<String>> {
        agent_dirs(&self.inbox_root)
    }

    /// Send a message.
    ///
    /// `to_agent == "all"` drops one copy into every registered inbox;
    /// otherwise the recipient is registered if needed and gets one copy.
    /// The sender's outbox copy is written first, so a send that fails
    /// partway still leaves a record of the message. All copies share the
    /// same id and timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for unusable ids, or an I/O error if a
    /// copy cannot be written. Recipients already served keep their copy.
    pub fn send(
        &self,
        from_agent: &str,
        to_agent: &str,
        msg_type: MessageKind,
        subject: &str,
        content: &str,
        reply_to: Option<&str>,
    ) -> Result<Message> {
        let _span = info_span!("send", from_agent, to_agent, kind = %msg_type).entered();
        validate_agent_id(from_agent)?;
        validate_recipient(to_agent)?;
        if let Some(parent) = reply_to {
            validate_message_id(parent)?;
        }

        let msg = Message::new(from_agent, to_agent, msg_type, subject, content, reply_to);
        let file_name = msg.file_name();

        let recipients = if msg.is_broadcast() {
            self.registered_agents()?
        } else {
            self.register(to_agent)?;
            vec![to_agent.to_owned()]
        };

        atomic::create_json(&self.outbox_dir(from_agent).join(&file_name), &msg)?;
        for (delivered, agent) in recipients.iter().enumerate() {
            if let Err(err) = atomic::create_json(&self.inbox_dir(agent).join(&file_name), &msg) {
                warn!(
                    msg_id = %msg.id,
                    failed = %agent,
                    delivered = ?&recipients[..delivered],
                    %err,
                    "delivery stopped partway"
                );
                return Err(err);
            }
        }

        info!(msg_id = %msg.id, recipients = recipients.len(), "message sent");
        Ok(msg)
    }

    /// Messages in `agent_id`'s inbox, ordered by file name.
    ///
    /// An unregistered agent has an empty inbox; it is not registered by
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for an unusable id, or
    /// `AppError::Decode` if a message file is malformed.
    pub fn receive(&self, agent_id: &str, unread_only: bool) -> Result<Vec<Message>> {
        validate_agent_id(agent_id)?;
        let dir = self.inbox_dir(agent_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut messages = Vec::new();
        for path in message_files(&dir)? {
            let msg: Message = atomic::read_json(&path)?;
            if unread_only && msg.read {
                continue;
            }
            messages.push(msg);
        }
        debug!(agent_id, count = messages.len(), unread_only, "inbox read");
        Ok(messages)
    }

    /// The copy of `msg_id` in `agent_id`'s inbox, if present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for unusable ids, or a read/decode error.
    pub fn read_message(&self, agent_id: &str, msg_id: &str) -> Result<Option<Message>> {
        validate_agent_id(agent_id)?;
        validate_message_id(msg_id)?;
        match atomic::read_json(&self.inbox_dir(agent_id).join(message_file_name(msg_id))) {
            Ok(msg) => Ok(Some(msg)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Flag `agent_id`'s copy of `msg_id` as read. Returns `false` if the
    /// copy does not exist. Repeated calls are harmless.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for unusable ids, `AppError::Lock` if
    /// the inbox lock cannot be taken, or a read/write error.
    pub fn mark_read(&self, agent_id: &str, msg_id: &str) -> Result<bool> {
        let _span = info_span!("mark_read", agent_id, msg_id).entered();
        validate_agent_id(agent_id)?;
        validate_message_id(msg_id)?;

        let dir = self.inbox_dir(agent_id);
        if !dir.is_dir() {
            return Ok(false);
        }
        let path = dir.join(message_file_name(msg_id));

        let _lock = FileLock::acquire(&dir.join(INBOX_LOCK), self.lock_timeout)?;
        let mut msg: Message = match atomic::read_json(&path) {
            Ok(msg) => msg,
            Err(AppError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };

        if !msg.read {
            msg.read = true;
            atomic::write_json(&path, &msg)?;
            debug!("message marked read");
        }
        Ok(true)
    }

    /// Every inbox and outbox copy of `msg_id` and of the messages replying
    /// to it, oldest first. Copies are not merged.
    ///
    /// # Errors
    ///
    /// Returns an I/O or decode error if a mailbox cannot be scanned.
    pub fn get_conversation(&self, msg_id: &str) -> Result<Vec<Message>> {
        let mut thread = Vec::new();
        for root in [&self.inbox_root, &self.outbox_root] {
            for agent in agent_dirs(root)? {
                for path in message_files(&root.join(&agent))? {
                    let msg: Message = atomic::read_json(&path)?;
                    if msg.id == msg_id || msg.reply_to.as_deref() == Some(msg_id) {
                        thread.push(msg);
                    }
                }
            }
        }
        thread.sort_by_key(|m| m.timestamp);
        Ok(thread)
    }

    /// Answer `msg_id` from `agent_id`'s inbox with a `response` addressed to
    /// its sender. Returns `None` if the original is not in the inbox.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidId` for unusable ids, or a send error.
    pub fn reply(&self, agent_id: &str, msg_id: &str, content: &str) -> Result<Option<Message>> {
        let Some(original) = self.read_message(agent_id, msg_id)? else {
            return Ok(None);
        };
        self.send(
            agent_id,
            &original.from_agent,
            MessageKind::Response,
            &format!("Re: {}", original.subject),
            content,
            Some(&original.id),
        )
        .map(Some)
    }

    /// Totals across every inbox.
    ///
    /// # Errors
    ///
    /// Returns an I/O or decode error if an inbox cannot be scanned.
    pub fn get_stats(&self) -> Result<MailboxStats> {
        let mut stats = MailboxStats::default();
        for agent in agent_dirs(&self.inbox_root)? {
            stats.agents_with_inbox += 1;
            for path in message_files(&self.inbox_dir(&agent))? {
                let msg: Message = atomic::read_json(&path)?;
                stats.total_messages += 1;
                if !msg.read {
                    stats.unread_messages += 1;
                }
            }
        }
        Ok(stats)
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|err| AppError::Io(format!("failed to create {}: {err}", dir.display())))
}

/// Names of the agent directories under `root` that are valid agent ids,
/// sorted.
fn agent_dirs(root: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(AppError::Io(format!(
                "failed to list {}: {err}",
                root.display()
            )))
        }
    };

    let mut agents = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|err| AppError::Io(format!("failed to list {}: {err}", root.display())))?;
        if !entry.path().is_dir() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if validate_agent_id(name).is_ok() => agents.push(name.to_owned()),
            name => debug!(?name, dir = %root.display(), "skipping non-agent directory"),
        }
    }
    agents.sort();
    Ok(agents)
}

/// `*.json` files in `dir`, sorted by file name. Dot files (temporaries,
/// the lock file) are skipped.
fn message_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let escaped = Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join("*.json");
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut files = glob::glob_with(&pattern.to_string_lossy(), options)
        .map_err(|err| AppError::Mailbox(format!("invalid inbox pattern: {err}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| AppError::Io(format!("failed to list {}: {err}", dir.display())))?;
    files.sort();
    Ok(files)
}
