//! Signed claims: creator assertions and bearer tokens.
//!
//! Both are CBOR-encoded claims plus an Ed25519 signature over
//! `DOMAIN || claims`. The claims travel as raw bytes so a verifier checks
//! exactly what was signed, never a re-encoding of it.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{IdentityId, VaultId};
use crate::keys::{Ed25519PublicKey, Ed25519Signature, IdentityKeypair};

/// Domain tag for creator assertion signatures.
pub const CREATOR_DOMAIN: &[u8] = b"passvault-v1 creator-assertion:";

/// Domain tag for bearer token signatures.
pub const TOKEN_DOMAIN: &[u8] = b"passvault-v1 bearer-token:";

/// What a creator assertion claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorClaims {
    /// The identity that admitted the subject.
    pub creator_id: IdentityId,
    /// The admitted identity.
    pub subject_id: IdentityId,
    /// The vault both identities belong to.
    pub vault_id: VaultId,
    /// When the assertion was signed (Unix ms).
    pub issued_at: i64,
}

/// A signed statement binding an identity to the identity that admitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorAssertion {
    /// CBOR-encoded [`CreatorClaims`].
    pub claims: Vec<u8>,
    /// Creator's signature over `CREATOR_DOMAIN || claims`.
    pub signature: Ed25519Signature,
}

impl CreatorAssertion {
    /// Sign claims with the creator's keypair.
    pub fn sign(creator: &IdentityKeypair, claims: &CreatorClaims) -> Result<Self> {
        let claims = encode(claims)?;
        let signature = creator.sign(&signed_message(CREATOR_DOMAIN, &claims));
        Ok(Self { claims, signature })
    }

    /// Decode the claims without checking the signature.
    ///
    /// Used to discover who the claimed creator is before its key is known.
    pub fn decode(&self) -> Result<CreatorClaims> {
        ciborium::from_reader(self.claims.as_slice())
            .map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    /// Verify the signature against the creator's key and return the claims.
    pub fn verify(&self, creator_key: &Ed25519PublicKey) -> Result<CreatorClaims> {
        creator_key.verify(&signed_message(CREATOR_DOMAIN, &self.claims), &self.signature)?;
        self.decode()
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

/// What a bearer token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The calling identity.
    pub identity_id: IdentityId,
    /// The vault the call is scoped to.
    pub vault_id: VaultId,
    /// Issue time (Unix ms).
    pub issued_at: i64,
    /// Expiry time (Unix ms).
    pub expires_at: i64,
}

/// A short-lived credential the transport layer attaches to each call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerToken {
    /// CBOR-encoded [`TokenClaims`].
    pub claims: Vec<u8>,
    /// Signature over `TOKEN_DOMAIN || claims`.
    pub signature: Ed25519Signature,
}

impl BearerToken {
    /// Sign a token.
    pub fn sign(keypair: &IdentityKeypair, claims: &TokenClaims) -> Result<Self> {
        let claims = encode(claims)?;
        let signature = keypair.sign(&signed_message(TOKEN_DOMAIN, &claims));
        Ok(Self { claims, signature })
    }

    /// Decode the claims without checking the signature.
    pub fn decode(&self) -> Result<TokenClaims> {
        ciborium::from_reader(self.claims.as_slice())
            .map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    /// Verify signature, vault scope and expiry at `now` (Unix ms).
    pub fn verify(
        &self,
        key: &Ed25519PublicKey,
        vault_id: &VaultId,
        now: i64,
    ) -> Result<TokenClaims> {
        key.verify(&signed_message(TOKEN_DOMAIN, &self.claims), &self.signature)?;
        let claims = self.decode()?;
        if &claims.vault_id != vault_id {
            return Err(CoreError::VaultMismatch {
                expected: vault_id.to_hex(),
                actual: claims.vault_id.to_hex(),
            });
        }
        if now > claims.expires_at {
            return Err(CoreError::TokenExpired {
                expires_at: claims.expires_at,
            });
        }
        Ok(claims)
    }

    /// Text form for an `Authorization: Bearer` header.
    pub fn to_header_value(&self) -> Result<String> {
        Ok(hex::encode(encode(self)?))
    }

    /// Parse the text form.
    pub fn from_header_value(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::DecodingError(e.to_string()))?;
        ciborium::from_reader(bytes.as_slice())
            .map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

fn signed_message(domain: &[u8], claims: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(domain.len() + claims.len());
    message.extend_from_slice(domain);
    message.extend_from_slice(claims);
    message
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_for(creator: &IdentityKeypair, subject: IdentityId, vault: VaultId) -> CreatorClaims {
        CreatorClaims {
            creator_id: IdentityId::derive(&creator.public_key(), &vault),
            subject_id: subject,
            vault_id: vault,
            issued_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_creator_assertion_verifies() {
        let creator = IdentityKeypair::generate();
        let vault = VaultId::generate();
        let claims = claims_for(&creator, IdentityId::from_bytes([7; 32]), vault);

        let assertion = CreatorAssertion::sign(&creator, &claims).unwrap();
        let verified = assertion.verify(&creator.public_key().signing).unwrap();

        assert_eq!(verified, claims);
    }

    #[test]
    fn test_creator_assertion_wrong_key_fails() {
        let creator = IdentityKeypair::generate();
        let impostor = IdentityKeypair::generate();
        let vault = VaultId::generate();
        let claims = claims_for(&creator, IdentityId::from_bytes([7; 32]), vault);

        let assertion = CreatorAssertion::sign(&creator, &claims).unwrap();
        assert!(matches!(
            assertion.verify(&impostor.public_key().signing),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_decode_does_not_need_key() {
        let creator = IdentityKeypair::generate();
        let vault = VaultId::generate();
        let claims = claims_for(&creator, IdentityId::from_bytes([9; 32]), vault);

        let assertion = CreatorAssertion::sign(&creator, &claims).unwrap();
        let bytes = assertion.to_bytes().unwrap();
        let decoded = CreatorAssertion::from_bytes(&bytes).unwrap().decode().unwrap();

        assert_eq!(decoded.creator_id, claims.creator_id);
    }

    #[test]
    fn test_tampered_claims_fail() {
        let creator = IdentityKeypair::generate();
        let vault = VaultId::generate();
        let claims = claims_for(&creator, IdentityId::from_bytes([7; 32]), vault);
        let mut assertion = CreatorAssertion::sign(&creator, &claims).unwrap();

        let forged = claims_for(&creator, IdentityId::from_bytes([8; 32]), vault);
        assertion.claims = encode(&forged).unwrap();

        assert!(assertion.verify(&creator.public_key().signing).is_err());
    }

    #[test]
    fn test_bearer_token_lifecycle() {
        let keypair = IdentityKeypair::generate();
        let vault = VaultId::generate();
        let claims = TokenClaims {
            identity_id: IdentityId::derive(&keypair.public_key(), &vault),
            vault_id: vault,
            issued_at: 1_000,
            expires_at: 2_000,
        };

        let token = BearerToken::sign(&keypair, &claims).unwrap();
        let header = token.to_header_value().unwrap();
        let parsed = BearerToken::from_header_value(&header).unwrap();

        let key = keypair.public_key().signing;
        assert_eq!(parsed.verify(&key, &vault, 1_500).unwrap(), claims);
        assert!(matches!(
            parsed.verify(&key, &vault, 2_001),
            Err(CoreError::TokenExpired { .. })
        ));
        assert!(matches!(
            parsed.verify(&key, &VaultId::generate(), 1_500),
            Err(CoreError::VaultMismatch { .. })
        ));
    }
}
