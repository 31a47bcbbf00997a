#![forbid(unsafe_code)]

//! `super-dispatch`: scheduler front end.
//!
//! Every subcommand is one short-lived process acting on the shared state
//! document; results are printed to stdout as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super_dispatch::orchestrator::{
    spawn_next, HealthMonitor, SessionRegistry, TaskQueue, TerminalSessions, TmuxSessions,
};
use super_dispatch::persistence::StateStore;
use super_dispatch::telemetry::{init_tracing, LogFormat};
use super_dispatch::{AppError, DispatchConfig, Result};

#[derive(Debug, Parser)]
#[command(
    name = "super-dispatch",
    about = "Shared task queue and session registry for agent sessions",
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
    /// Queue and capacity summary (default).
    Status,
    /// List running sessions.
    Sessions,
    /// List queued tasks in dequeue order.
    Queue,
    /// Whether another session fits under the cap.
    CanSpawn,
    /// Check every session's terminal session.
    Health,
    /// List sessions past the timeout.
    TimedOut,
    /// Queue a task.
    Enqueue {
        /// Task identifier.
        task_id: String,
        /// Agent type tag.
        agent_type: String,
        /// Lower runs sooner. Defaults to `default_priority` from config.
        #[arg(long)]
        priority: Option<i64>,
        /// Prompt handed to the agent.
        #[arg(long, default_value = "")]
        prompt: String,
    },
    /// Put a task at the head of the queue.
    Preempt {
        /// Task identifier.
        task_id: String,
        /// Agent type tag.
        agent_type: String,
        /// Prompt handed to the agent.
        #[arg(long, default_value = "")]
        prompt: String,
    },
    /// Pop the head of the queue without starting it.
    Dequeue,
    /// Register a session directly, ignoring the cap.
    AddSession {
        /// Task identifier.
        task_id: String,
        /// Agent type tag.
        agent_type: String,
        /// Defaults to `default_priority` from config.
        #[arg(long)]
        priority: Option<i64>,
    },
    /// Drop a session from the registry.
    RemoveSession {
        /// Session identifier.
        session_id: String,
    },
    /// Kill a session's terminal session and drop it from the registry.
    Cleanup {
        /// Session identifier.
        session_id: String,
    },
    /// Start the queue head in a new terminal session if a slot is free.
    SpawnNext,
    /// Remove timed-out and dead sessions.
    Sweep,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let config = DispatchConfig::load(args.home)?;
    info!(home = %config.home().display(), "configuration loaded");

    let store = Arc::new(StateStore::from_config(&config));
    let terminals: Arc<dyn TerminalSessions> = Arc::new(TmuxSessions::from_config(&config));
    let registry = SessionRegistry::new(Arc::clone(&store));
    let queue = TaskQueue::new(Arc::clone(&store));
    let monitor = HealthMonitor::new(Arc::clone(&store), Arc::clone(&terminals));
    let default_priority = config.settings.default_priority;

    match args.command.unwrap_or(Command::Status) {
        Command::Status => print_json(&queue.get_queue_status()?),
        Command::Sessions => print_json(&registry.get_active_sessions()?),
        Command::Queue => print_json(&queue.list_queue()?),
        Command::CanSpawn => print_json(&json!({ "can_spawn": registry.can_spawn()? })),
        Command::Health => print_json(&monitor.health_check()?),
        Command::TimedOut => print_json(&monitor.get_timed_out_sessions()?),
        Command::Enqueue {
            task_id,
            agent_type,
            priority,
            prompt,
        } => print_json(&queue.queue_task(
            &task_id,
            &agent_type,
            priority.unwrap_or(default_priority),
            &prompt,
        )?),
        Command::Preempt {
            task_id,
            agent_type,
            prompt,
        } => print_json(&queue.preempt_queue(&task_id, &agent_type, &prompt)?),
        Command::Dequeue => print_json(&queue.dequeue_next()?),
        Command::AddSession {
            task_id,
            agent_type,
            priority,
        } => print_json(&registry.add_session(
            &task_id,
            &agent_type,
            priority.unwrap_or(default_priority),
        )?),
        Command::RemoveSession { session_id } => {
            print_json(&json!({ "removed": registry.remove_session(&session_id)? }))
        }
        Command::Cleanup { session_id } => {
            print_json(&json!({ "removed": monitor.cleanup_session(&session_id)? }))
        }
        Command::SpawnNext => print_json(&spawn_next(&store, terminals.as_ref())?),
        Command::Sweep => print_json(&monitor.sweep()?),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(format!("failed to render output: {err}")))?;
    println!("{text}");
    Ok(())
}
