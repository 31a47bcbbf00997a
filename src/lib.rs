#![forbid(unsafe_code)]

//! `super-dispatch`: shared task queue, session registry and mailboxes for
//! coding agents running in separate terminal sessions.
//!
//! All coordination happens through files under one home directory, so any
//! number of independent processes can enqueue work, claim slots, and
//! exchange messages without a resident supervisor.

pub mod config;
pub mod errors;
pub mod messaging;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod telemetry;

pub use config::DispatchConfig;
pub use errors::{AppError, Result};
