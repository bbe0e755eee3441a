//! # passvault Core
//!
//! Pure primitives for passvault: strongly-typed ids, identity key material,
//! sealed per-identity copies of secrets, and signed creator assertions.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`IdentityKeypair`] / [`IdentityPublicKey`] - an identity's keys
//! - [`IdentityId`] - derived from a public key and a [`VaultId`]
//! - [`Passframe`] - one identity's ciphertext of a value's secret
//! - [`CreatorAssertion`] - signed claim binding an identity to its admitter
//! - [`CryptoProvider`] - the seam the engine calls through
//!
//! ## Data Model
//!
//! [`Vault`], [`Identity`], [`Right`], [`Value`] and [`IdentityValue`] mirror
//! the records held by the directory service.

pub mod assertion;
pub mod error;
pub mod ids;
pub mod keys;
pub mod provider;
pub mod sealed;
pub mod types;

pub use assertion::{BearerToken, CreatorAssertion, CreatorClaims, TokenClaims};
pub use error::{CoreError, Result};
pub use ids::{IdentityId, IdentityValueId, RightId, ValueId, VaultId};
pub use keys::{
    Ed25519PublicKey, Ed25519Signature, IdentityKeypair, IdentityPublicKey, X25519PublicKey,
};
pub use provider::{CryptoProvider, StandardCrypto};
pub use sealed::{Passframe, SealFormat, SealedBox};
pub use types::{
    Direction, EncryptedCopy, Grant, Identity, IdentityValue, NewIdentity, Right, RightTarget,
    Secret, Value, ValueRecord, ValueType, Vault,
};

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
