//! Error types for passvault core primitives.

use thiserror::Error;

/// Errors raised by the crypto collaborator and the encodings it produces.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption error: {0}")]
    DecryptionError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("token expired at {expires_at}")]
    TokenExpired { expires_at: i64 },

    #[error("token was issued for vault {expected}, not {actual}")]
    VaultMismatch { expected: String, actual: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
