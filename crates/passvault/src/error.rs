//! Error types for the vault engine.

use std::fmt;

use passvault_core::{CoreError, IdentityId};
use passvault_directory::DirectoryError;
use passvault_perms::{ChainError, PatternError};
use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Directory or transport error, passed through as-is.
    #[error("directory error: {0}")]
    Directory(DirectoryError),

    /// Crypto error outside of per-recipient fan-out.
    #[error("crypto error: {0}")]
    Crypto(#[from] CoreError),

    /// A rights pattern failed to parse.
    #[error("invalid rights pattern: {0}")]
    Pattern(#[from] PatternError),

    /// A value name is not concrete.
    #[error("invalid value name: {0}")]
    InvalidName(#[source] PatternError),

    /// An identity's lineage could not be proven.
    #[error("trust chain error: {0}")]
    Chain(#[from] ChainError),

    /// The caller lacks the entitlement the operation needs.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A vault, identity, right or value does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Encrypting a copy for one recipient failed.
    #[error("encrypting copy for identity {identity} failed: {source}")]
    Encryption {
        identity: IdentityId,
        #[source]
        source: CoreError,
    },

    /// Storing a copy for one recipient failed.
    #[error("storing copy for identity {identity} failed: {source}")]
    Persistence {
        identity: IdentityId,
        #[source]
        source: DirectoryError,
    },

    /// Several independent failures, in the order they happened.
    #[error(transparent)]
    Aggregate(AggregateError),

    /// An operation failed and undoing its partial effects failed too.
    #[error("{original}; rollback failed: {rollback}")]
    RollbackFailed {
        original: Box<VaultError>,
        rollback: Box<VaultError>,
    },
}

impl VaultError {
    /// Whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }
}

impl From<DirectoryError> for VaultError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Directory(other),
        }
    }
}

/// Joined per-recipient failures.
#[derive(Debug)]
pub struct AggregateError {
    pub causes: Vec<VaultError>,
}

impl AggregateError {
    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failures: ", self.causes.len())?;
        for (i, cause) in self.causes.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
