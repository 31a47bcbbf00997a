#![forbid(unsafe_code)]

//! `agent-mail`: mailbox companion for `super-dispatch`.
//!
//! Lets an agent (or the operator acting for one) send, read, and thread
//! messages through the shared mailbox tree. Output is JSON on stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use super_dispatch::messaging::Mailbox;
use super_dispatch::models::message::MessageKind;
use super_dispatch::telemetry::{init_tracing, LogFormat};
use super_dispatch::{AppError, DispatchConfig, Result};

#[derive(Debug, Parser)]
#[command(
    name = "agent-mail",
    about = "Mailboxes for super-dispatch agents",
    version,
    long_about = None
)]
struct Cli {
    /// State directory. Defaults to `$SUPER_DISPATCH_HOME` or `~/.super-dispatch`.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Message totals across all inboxes (default).
    Stats,

    /// Create an agent's inbox.
    Register {
        /// Agent identifier.
        agent: String,
    },

    /// Send a message. Use `all` as the recipient to broadcast.
    Send {
        /// Sender agent.
        from: String,
        /// Recipient agent, or `all`.
        to: String,
        /// One of request, response, broadcast, handoff, status, data.
        #[arg(long = "type", default_value = "request")]
        kind: MessageKind,
        /// Subject line.
        #[arg(long, default_value = "")]
        subject: String,
        /// Message body.
        content: String,
        /// Message this one answers.
        #[arg(long)]
        reply_to: Option<String>,
    },

    /// List an agent's unread messages.
    Receive {
        /// Agent identifier.
        agent: String,
        /// Include messages already read.
        #[arg(long)]
        all: bool,
    },

    /// Show one message and mark it read.
    Read {
        /// Agent identifier.
        agent: String,
        /// Message identifier.
        msg_id: String,
    },

    /// Answer a message in an agent's inbox.
    Reply {
        /// Replying agent.
        agent: String,
        /// Message being answered.
        msg_id: String,
        /// Reply body.
        content: String,
    },

    /// Show a message together with its replies.
    Thread {
        /// Message identifier.
        msg_id: String,
    },

    /// Broadcast a status update to every registered agent.
    Broadcast {
        /// Sender agent.
        from: String,
        /// Status text.
        status: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let config = DispatchConfig::load(args.home)?;
    let mailbox = Mailbox::from_config(&config)?;

    match args.command.unwrap_or(Command::Stats) {
        Command::Stats => print_json(&mailbox.get_stats()?),
        Command::Register { agent } => {
            print_json(&json!({ "agent": agent, "created": mailbox.register(&agent)? }))
        }
        Command::Send {
            from,
            to,
            kind,
            subject,
            content,
            reply_to,
        } => print_json(&mailbox.send(
            &from,
            &to,
            kind,
            &subject,
            &content,
            reply_to.as_deref(),
        )?),
        Command::Receive { agent, all } => print_json(&mailbox.receive(&agent, !all)?),
        Command::Read { agent, msg_id } => {
            let mut msg = mailbox
                .read_message(&agent, &msg_id)?
                .ok_or_else(|| AppError::NotFound(format!("message {msg_id} for {agent}")))?;
            msg.read = mailbox.mark_read(&agent, &msg_id)?;
            print_json(&msg)
        }
        Command::Reply {
            agent,
            msg_id,
            content,
        } => {
            let reply = mailbox
                .reply(&agent, &msg_id, &content)?
                .ok_or_else(|| AppError::NotFound(format!("message {msg_id} for {agent}")))?;
            print_json(&reply)
        }
        Command::Thread { msg_id } => print_json(&mailbox.get_conversation(&msg_id)?),
        Command::Broadcast { from, status } => {
            print_json(&mailbox.broadcast_status(&from, &status)?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(format!("failed to render output: {err}")))?;
    println!("{text}");
    Ok(())
}
