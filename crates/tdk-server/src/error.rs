//! Pipeline error types

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the pipeline stages and the orchestrator
///
/// Stages never let these escape to the HTTP layer; the service facade turns
/// them into `error` outcomes carrying the `Display` text.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input DSV file does not exist
    #[error("DSV file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Input could not be decoded or split into records
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Existence check, DDL, or table shape mismatch
    #[error("Schema error: {0}")]
    Schema(String),

    /// Truncate, insert or commit failure
    #[error("Data error: {0}")]
    Data(String),

    /// Export query failure
    #[error("Query error: {0}")]
    Query(String),

    /// Downstream HTTP call failed or timed out
    #[error("Transport error: {0}")]
    Transport(String),

    /// Could not open a database connection
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn schema(err: impl std::fmt::Display) -> Self {
        Self::Schema(err.to_string())
    }

    pub fn data(err: impl std::fmt::Display) -> Self {
        Self::Data(err.to_string())
    }

    pub fn query(err: impl std::fmt::Display) -> Self {
        Self::Query(err.to_string())
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {}", err))
    }
}
