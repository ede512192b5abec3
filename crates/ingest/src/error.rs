//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Main error type for ingestion operations.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A database operation exceeded its time budget.
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// The space was already walked to completion.
    #[error("Space {0} is already backfilled; purge before walking it again")]
    AlreadyBackfilled(String),

    /// Archive read failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Operator notification failed.
    #[error("Notification error: {0}")]
    Notify(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Input rejected before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core DirtOnYou error.
    #[error("Core error: {0}")]
    Core(#[from] dirtonyou_core::Error),
}

/// Result alias for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

impl IngestError {
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Connectivity-class failures: the backing service could not be reached
    /// or did not answer in time.
    pub fn is_connectivity(&self) -> bool {
        match self {
            IngestError::Timeout(_) | IngestError::Http(_) => true,
            IngestError::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(IngestError::Timeout("insert".to_string()).is_connectivity());
        assert!(IngestError::Database(sqlx::Error::PoolClosed).is_connectivity());
        assert!(IngestError::Database(sqlx::Error::PoolTimedOut).is_connectivity());
        assert!(!IngestError::Database(sqlx::Error::RowNotFound).is_connectivity());
        assert!(!IngestError::validation("empty").is_connectivity());
        assert!(!IngestError::AlreadyBackfilled("g1".to_string()).is_connectivity());
    }
}
