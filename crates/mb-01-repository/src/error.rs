//! Error types for the blob transfer protocol

use thiserror::Error;

/// Errors raised by a [`RepositorySession`](crate::ports::RepositorySession).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The server refused the connection or the login.
    #[error("Cannot connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// A directory to be created exists already.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The path, or its parent directory, does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A transfer, listing or delete failed on an open session.
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

impl RepositoryError {
    pub(crate) fn io(path: &str, error: impl std::fmt::Display) -> Self {
        RepositoryError::Io {
            path: path.to_string(),
            reason: error.to_string(),
        }
    }
}
