use crate::domain::EntityKey;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can handle failures consistently (denial vs generic failure reply).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("handler expects {expected} positional arguments, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("no such field: {0}")]
    KeyNotFound(String),

    #[error("key already exists: {0}")]
    DuplicateKey(String),

    #[error("invalid value for field: {0}")]
    InvalidField(String),

    #[error("session not found: {0}")]
    SessionNotFound(EntityKey),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),

    #[error("chat migration failed: {}", .0.join("; "))]
    Migration(Vec<String>),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
