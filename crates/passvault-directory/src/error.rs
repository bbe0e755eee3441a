//! Error types for the directory module.

use thiserror::Error;

/// Errors that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A vault, identity, right, value or copy does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A uniqueness rule would be broken (duplicate value name, second copy
    /// for the same identity, identity already admitted).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored bytes could not be decoded into a record.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Record serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The backend could not service the call (poisoned lock, worker gone).
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;
