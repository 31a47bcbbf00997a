//! Domain model module declarations.

pub mod ids;
pub mod message;
pub mod session;
pub mod task;
