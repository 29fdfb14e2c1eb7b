//! Error types for repository key operations.

use thiserror::Error;

/// Errors that can occur while reading or writing repository keys.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The key name is invalid.
    #[error("invalid key name: {name}: {reason}")]
    InvalidKey { name: String, reason: String },

    /// I/O error during file-based key operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend failed for a reason other than I/O.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Convenience type alias for repository key operations.
pub type Result<T> = std::result::Result<T, RepoError>;
