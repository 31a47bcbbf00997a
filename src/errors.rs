//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every failure mode of the dispatch core.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Shared state document could not be read or written.
    Store(String),
    /// Advisory lock could not be acquired or released.
    Lock(String),
    /// A persisted document did not decode.
    Decode(String),
    /// Mailbox layout or message file failure.
    Mailbox(String),
    /// Terminal multiplexer command failure.
    Terminal(String),
    /// Identifier is not safe to use as a file or session name.
    InvalidId(String),
    /// Entity with the same identifier is already present.
    AlreadyExists(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Store(msg) => write!(f, "store: {msg}"),
            Self::Lock(msg) => write!(f, "lock: {msg}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Mailbox(msg) => write!(f, "mailbox: {msg}"),
            Self::Terminal(msg) => write!(f, "terminal: {msg}"),
            Self::InvalidId(msg) => write!(f, "invalid id: {msg}"),
            Self::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
