//! Persistence layer modules.

pub mod atomic;
pub mod lock;
pub mod state_store;

pub use state_store::{StateDocument, StateStore};
