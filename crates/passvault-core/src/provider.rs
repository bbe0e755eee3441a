//! The crypto collaborator.
//!
//! The engine never calls cipher or signature code directly; it goes through
//! [`CryptoProvider`] so the primitives can be swapped (or faulted in tests)
//! without touching fan-out logic.

use crate::assertion::{BearerToken, CreatorAssertion, CreatorClaims, TokenClaims};
use crate::error::Result;
use crate::ids::{IdentityId, VaultId};
use crate::keys::{IdentityKeypair, IdentityPublicKey};
use crate::sealed::{Passframe, SealedBox};

/// Cryptographic operations the vault engine depends on.
///
/// All methods are pure computation: no I/O, no shared state.
pub trait CryptoProvider: Send + Sync {
    /// Generate a fresh identity keypair.
    fn generate_keypair(&self) -> IdentityKeypair;

    /// Derive the deterministic identity id for a public key in a vault.
    fn derive_identity_id(&self, public_key: &IdentityPublicKey, vault_id: &VaultId) -> IdentityId;

    /// Encrypt a secret to one identity.
    fn encrypt(&self, public_key: &IdentityPublicKey, plaintext: &[u8]) -> Result<Passframe>;

    /// Decrypt a copy with the holder's keypair.
    fn decrypt(&self, keypair: &IdentityKeypair, passframe: &Passframe) -> Result<Vec<u8>>;

    /// Mint a bearer token for the transport layer.
    fn sign_bearer_token(
        &self,
        keypair: &IdentityKeypair,
        vault_id: &VaultId,
        issued_at: i64,
        ttl_ms: i64,
    ) -> Result<BearerToken>;

    /// Sign an assertion that `keypair`'s identity admitted `subject`.
    fn sign_creator_assertion(
        &self,
        keypair: &IdentityKeypair,
        subject: &IdentityId,
        vault_id: &VaultId,
        issued_at: i64,
    ) -> Result<CreatorAssertion>;

    /// Verify an assertion against the claimed creator's public key.
    fn verify_creator_assertion(
        &self,
        creator_key: &IdentityPublicKey,
        assertion: &CreatorAssertion,
    ) -> Result<CreatorClaims>;

    /// Decode an assertion without verifying it.
    fn decode_creator_assertion(&self, assertion: &CreatorAssertion) -> Result<CreatorClaims>;
}

/// Ed25519 / X25519 / ChaCha20-Poly1305 implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCrypto;

impl StandardCrypto {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for StandardCrypto {
    fn generate_keypair(&self) -> IdentityKeypair {
        IdentityKeypair::generate()
    }

    fn derive_identity_id(&self, public_key: &IdentityPublicKey, vault_id: &VaultId) -> IdentityId {
        IdentityId::derive(public_key, vault_id)
    }

    fn encrypt(&self, public_key: &IdentityPublicKey, plaintext: &[u8]) -> Result<Passframe> {
        SealedBox::seal(public_key, plaintext)?.to_passframe()
    }

    fn decrypt(&self, keypair: &IdentityKeypair, passframe: &Passframe) -> Result<Vec<u8>> {
        SealedBox::from_passframe(passframe)?.open(keypair)
    }

    fn sign_bearer_token(
        &self,
        keypair: &IdentityKeypair,
        vault_id: &VaultId,
        issued_at: i64,
        ttl_ms: i64,
    ) -> Result<BearerToken> {
        let claims = TokenClaims {
            identity_id: self.derive_identity_id(&keypair.public_key(), vault_id),
            vault_id: *vault_id,
            issued_at,
            expires_at: issued_at.saturating_add(ttl_ms),
        };
        BearerToken::sign(keypair, &claims)
    }

    fn sign_creator_assertion(
        &self,
        keypair: &IdentityKeypair,
        subject: &IdentityId,
        vault_id: &VaultId,
        issued_at: i64,
    ) -> Result<CreatorAssertion> {
        let claims = CreatorClaims {
            creator_id: self.derive_identity_id(&keypair.public_key(), vault_id),
            subject_id: *subject,
            vault_id: *vault_id,
            issued_at,
        };
        CreatorAssertion::sign(keypair, &claims)
    }

    fn verify_creator_assertion(
        &self,
        creator_key: &IdentityPublicKey,
        assertion: &CreatorAssertion,
    ) -> Result<CreatorClaims> {
        assertion.verify(&creator_key.signing)
    }

    fn decode_creator_assertion(&self, assertion: &CreatorAssertion) -> Result<CreatorClaims> {
        assertion.decode()
    }
}
