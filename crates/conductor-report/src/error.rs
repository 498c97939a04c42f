//! Error types for report generation.

use std::path::PathBuf;
use thiserror::Error;

use conductor_persistence::PersistenceError;

/// Errors that can occur while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to write the rendered report.
    #[error("failed to write report: {0}")]
    Write(#[from] PersistenceError),

    /// Failed to list an agent's state directory.
    #[error("failed to list {path}: {source}")]
    ListError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
