//! Error types for CLI operations.

use thiserror::Error;

/// Main error type for CLI operations.
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline error.
    #[error(transparent)]
    Ingest(#[from] dirtonyou_ingest::IngestError),

    /// Core error.
    #[error(transparent)]
    Core(#[from] dirtonyou_core::Error),

    /// Command execution error.
    #[error("Command execution error: {0}")]
    Command(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
