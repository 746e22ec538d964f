// ================================================================
// File: tally-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    /// A claim is blocked until a staff member approves the earned task.
    #[error("Reward is awaiting staff approval: {0}")]
    VerificationPending(String),

    #[error("Reward verification was rejected: {0}")]
    VerificationRejected(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write conflicts the storage layer gave up retrying.
    #[error("Transient storage error: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Uuid error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Effect queue error: {0}")]
    EffectQueue(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Errors the caller can act on (show to the user) instead of treating
    /// as an internal failure.
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::VerificationPending(_) | Error::VerificationRejected(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
