//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use passvault::{Result, Vault, VaultConfig};
use passvault_core::{
    CryptoProvider, Identity, IdentityId, IdentityKeypair, Secret, StandardCrypto, ValueId,
    ValueType,
};
use passvault_directory::{Directory, MemoryDirectory};

/// A vault with its operator keypair.
pub struct VaultFixture<D: Directory = MemoryDirectory, C: CryptoProvider = StandardCrypto> {
    pub vault: Vault<D, C>,
    pub operator: IdentityKeypair,
}

impl VaultFixture {
    /// A fresh vault in an in-memory directory.
    pub async fn new() -> Result<Self> {
        Self::with(
            Arc::new(MemoryDirectory::new()),
            StandardCrypto::new(),
            VaultConfig::default(),
        )
        .await
    }
}

impl<D: Directory, C: CryptoProvider> VaultFixture<D, C> {
    /// A fresh vault on the given directory and crypto provider.
    pub async fn with(directory: Arc<D>, crypto: C, config: VaultConfig) -> Result<Self> {
        let (vault, operator) = Vault::create(directory, crypto, "fixture", config).await?;
        Ok(Self { vault, operator })
    }

    pub fn id_of(&self, keypair: &IdentityKeypair) -> IdentityId {
        self.vault.identity_id_of(keypair)
    }

    pub fn operator_id(&self) -> IdentityId {
        self.id_of(&self.operator)
    }

    /// Admit a new identity on the operator's authority.
    pub async fn admit(&self, name: &str, patterns: &[&str]) -> Result<(Identity, IdentityKeypair)> {
        self.admit_by(&self.operator, name, patterns).await
    }

    /// Admit a new identity on `creator`'s authority.
    pub async fn admit_by(
        &self,
        creator: &IdentityKeypair,
        name: &str,
        patterns: &[&str],
    ) -> Result<(Identity, IdentityKeypair)> {
        let (added, keypair) = self.vault.create_identity(creator, name, patterns).await?;
        Ok((added.identity, keypair))
    }

    /// Store a string secret as the operator.
    pub async fn add_secret(&self, name: &str, secret: &str) -> Result<ValueId> {
        self.vault
            .add_value(&self.operator, name, &Secret::new(secret), ValueType::String)
            .await
    }

    /// Decrypt a value as `reader`, as a string.
    pub async fn read(&self, reader: &IdentityKeypair, name: &str) -> Result<Option<String>> {
        let value = self.vault.get_value_by_name(reader, name).await?;
        Ok(value.secret.as_str().map(str::to_string))
    }

    /// Ids of the identities holding a copy of a value, in id order.
    pub async fn holders(&self, value_id: &ValueId) -> Result<Vec<IdentityId>> {
        let record = self
            .vault
            .directory()
            .get_value_by_id(&self.vault.id(), value_id)
            .await?;
        Ok(record.copies.iter().map(|copy| copy.identity_id).collect())
    }
}

/// Deterministic keypairs for multi-party tests.
pub fn seeded_keypairs(count: usize, seed: u64) -> Vec<IdentityKeypair> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            IdentityKeypair::from_seed(&bytes)
        })
        .collect()
}

/// Random secret bytes.
pub fn random_secret(len: usize) -> Secret {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    Secret::new(bytes)
}
