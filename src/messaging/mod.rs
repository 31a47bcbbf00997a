//! Inter-agent messaging over per-agent file mailboxes.

pub mod mailbox;
pub mod templates;

pub use mailbox::{Mailbox, MailboxStats};
