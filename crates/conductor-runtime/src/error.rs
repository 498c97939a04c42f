//! Error types for the runtime crate.

use thiserror::Error;

use conductor_persistence::PersistenceError;

/// Errors that can occur in the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The coordination store could not be read or written.
    #[error("coordination store error: {0}")]
    Store(#[from] PersistenceError),

    /// Agent not registered.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Agent id already registered.
    #[error("agent already registered: {0}")]
    AgentExists(String),

    /// No agent holds the reviewer role.
    #[error("no reviewer agent registered")]
    NoReviewer,

    /// Runtime not started.
    #[error("coordinator not started")]
    NotStarted,

    /// Runtime already started.
    #[error("coordinator already started")]
    AlreadyStarted,

    /// Shutdown error.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
