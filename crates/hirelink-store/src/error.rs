use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Input failed validation (empty content, self-send, length bound).
    #[error("{0}")]
    Validation(String),

    /// The acting user lacks rights over the target message.
    #[error("{0}")]
    Authorization(String),

    /// A query expected exactly one message but found none.
    #[error("Message not found")]
    NotFound,

    /// Referenced user does not exist.
    #[error("User not found")]
    UserNotFound,

    /// Referenced job does not exist.
    #[error("Job not found")]
    JobNotFound,

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
