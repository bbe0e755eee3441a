//! Error types for the permissions module.

use passvault_core::IdentityId;
use thiserror::Error;

/// Errors from parsing rights patterns and value names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// The outer `(dirs)TARGET.segment...` syntax does not match.
    #[error("malformed rights pattern {pattern:?}: {reason}")]
    MalformedPattern { pattern: String, reason: String },

    /// More than three direction letters.
    #[error("too many directions in {pattern:?}: {count} given, at most 3 (rwd)")]
    TooManyDirections { pattern: String, count: usize },

    /// A concrete value name carries `*` or `>`.
    #[error("value name {0:?} must not contain wildcard symbols * or >")]
    WildcardInName(String),

    /// A value name is not a `VALUES.segment...` subject.
    #[error("malformed value name {name:?}: {reason}")]
    MalformedName { name: String, reason: String },
}

/// Errors from verifying an identity's admission lineage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The creator assertion is absent or cannot be decoded.
    #[error("bad creator assertion on identity {identity}: {reason}")]
    BadAssertion { identity: IdentityId, reason: String },

    /// Zero or several peers carry the claimed creator id.
    #[error("identity {identity} claims creator {creator}, found {found} matching peers")]
    AmbiguousOrMissingCreator {
        identity: IdentityId,
        creator: IdentityId,
        found: usize,
    },

    /// The assertion does not verify against the creator's key.
    #[error("creator assertion on identity {identity} is not signed by {creator}")]
    InvalidSignature {
        identity: IdentityId,
        creator: IdentityId,
    },

    /// The chain loops back on itself before reaching an operator.
    #[error("trust chain revisits identity {identity} before reaching an operator")]
    CyclicChain { identity: IdentityId },
}

/// Result type for pattern parsing.
pub type Result<T> = std::result::Result<T, PatternError>;
