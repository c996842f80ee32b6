//! Error types for etalon.

use thiserror::Error;

/// Result type alias using etalon's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for etalon operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A submitted text tokenized to zero sentences
    #[error("Empty text: {0} contains no sentences")]
    EmptyText(uuid::Uuid),

    /// Label was neither "?" nor a base-10 integer
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Linguistic normalizer failed (lexicon load, analyzer fault)
    #[error("Normalizer error: {0}")]
    Normalizer(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ingestion queue error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a failed invocation may succeed if retried unchanged.
    ///
    /// Store, queue and I/O faults are transient; malformed input is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Queue(_) | Error::Io(_) | Error::Internal(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
