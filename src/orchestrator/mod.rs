//! Session orchestration modules.
//!
//! Covers the session registry, the priority task queue, timeout and
//! liveness checks, and the terminal multiplexer adapter.

pub mod health;
pub mod registry;
pub mod spawner;
pub mod task_queue;
pub mod terminal;

pub use health::{HealthMonitor, HealthReport, SweepReport};
pub use registry::SessionRegistry;
pub use spawner::{spawn_next, Launch};
pub use task_queue::{QueueStatus, TaskQueue};
pub use terminal::{TerminalSessions, TmuxSessions};
