//! Sealed copies of a value's secret.
//!
//! A passframe is the secret encrypted to exactly one identity:
//!
//! 1. A fresh ephemeral X25519 key agrees a shared secret with the
//!    recipient's encryption key.
//! 2. BLAKE3 in derive-key mode turns that secret (bound to both public keys)
//!    into a ChaCha20-Poly1305 key.
//! 3. The plaintext is sealed under a random 96-bit nonce.
//!
//! Only the holder of the recipient's private key can open it.

use bytes::Bytes;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::error::{CoreError, Result};
use crate::keys::{IdentityKeypair, IdentityPublicKey, X25519PublicKey};

/// Domain tag for sealing-key derivation.
const SEAL_DOMAIN: &str = "passvault-v1 sealed-copy";

/// Format identifier for sealed boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SealFormat {
    /// X25519 + BLAKE3 KDF + ChaCha20-Poly1305.
    X25519ChaCha20Poly1305 = 1,
}

/// The decoded form of a passframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    /// Algorithm used.
    pub format: SealFormat,

    /// Sender's ephemeral X25519 public key.
    pub ephemeral_public: X25519PublicKey,

    /// Nonce used for encryption.
    pub nonce: [u8; 12],

    /// Ciphertext including the authentication tag.
    pub ciphertext: Vec<u8>,
}

/// One identity's ciphertext of a value's secret, in its stored form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passframe(pub Bytes);

impl Passframe {
    /// Wrap stored bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Get the stored bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the stored bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the passframe is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Passframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Passframe({} bytes)", self.0.len())
    }
}

fn sealing_key(shared: &[u8; 32], ephemeral: &X25519PublicKey, recipient: &X25519PublicKey) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(SEAL_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral.as_bytes());
    hasher.update(recipient.as_bytes());
    *hasher.finalize().as_bytes()
}

impl SealedBox {
    /// Seal plaintext to a recipient.
    pub fn seal(recipient: &IdentityPublicKey, plaintext: &[u8]) -> Result<Self> {
        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = X25519PublicKey::from(PublicKey::from(&ephemeral));
        let shared = ephemeral.diffie_hellman(&recipient.encryption.to_dalek());

        let key = sealing_key(shared.as_bytes(), &ephemeral_public, &recipient.encryption);
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))?;

        Ok(Self {
            format: SealFormat::X25519ChaCha20Poly1305,
            ephemeral_public,
            nonce,
            ciphertext,
        })
    }

    /// Open with the recipient's keypair.
    pub fn open(&self, recipient: &IdentityKeypair) -> Result<Vec<u8>> {
        match self.format {
            SealFormat::X25519ChaCha20Poly1305 => {
                let shared = recipient.diffie_hellman(&self.ephemeral_public);
                let key = sealing_key(
                    &shared,
                    &self.ephemeral_public,
                    &recipient.public_key().encryption,
                );
                let cipher = ChaCha20Poly1305::new_from_slice(&key)
                    .map_err(|e| CoreError::DecryptionError(e.to_string()))?;

                cipher
                    .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
                    .map_err(|e| CoreError::DecryptionError(e.to_string()))
            }
        }
    }

    /// Encode as a passframe.
    pub fn to_passframe(&self) -> Result<Passframe> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(Passframe(Bytes::from(buf)))
    }

    /// Decode a passframe.
    pub fn from_passframe(passframe: &Passframe) -> Result<Self> {
        ciborium::from_reader(passframe.as_bytes())
            .map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}
