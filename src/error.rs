//! Error Types
//!
//! Typed errors surfaced by the engine and its collaborators.
//!
//! Callers of [`SessionManager`](crate::execution::SessionManager) only ever
//! see [`EngineError`]. Repository and catalog errors are converted at the
//! boundary.

use thiserror::Error;

use crate::session::SessionId;

/// Message carried by every command rejected on a terminal session.
pub const SESSION_FINISHED: &str = "session already finished";

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or empty workout input. Not retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The user already has a session in flight. `session_id` is `None`
    /// when the holder's record could not be read.
    #[error("user '{user_id}' already has an active session ({})", holder(.session_id))]
    Conflict {
        user_id: String,
        session_id: Option<SessionId>,
    },

    /// Command is illegal for the current session status.
    #[error("state error: {0}")]
    State(String),

    /// Workout or snapshot could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Repository failure other than a conflict.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// Shorthand for a [`EngineError::State`] error.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// The error returned for any event on a terminal session.
    pub fn finished() -> Self {
        Self::State(SESSION_FINISHED.to_string())
    }
}

fn holder(session_id: &Option<SessionId>) -> String {
    match session_id {
        Some(id) => id.to_string(),
        None => "unreadable record".to_string(),
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => Self::NotFound(format!("workout '{}'", id)),
            CatalogError::Invalid(msg) => Self::Validation(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Errors from a [`SessionRepository`](crate::session::SessionRepository).
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An active record already exists for the user.
    #[error("active session already exists: {}", holder(.existing))]
    Conflict { existing: Option<SessionId> },

    #[error("no snapshot for session {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from a [`WorkoutCatalog`](crate::workout::WorkoutCatalog).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("workout '{0}' not found")]
    NotFound(String),

    #[error("failed to read workout: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse workout YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid workout: {0}")]
    Invalid(String),
}

/// Errors loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}
