//! Fault-injecting collaborators.
//!
//! [`FlakyCrypto`] and [`InstrumentedDirectory`] wrap a real implementation,
//! delegate to it, and fail chosen calls on demand. The directory wrapper
//! also counts successful writes so tests can assert that an operation wrote
//! nothing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use passvault_core::{
    BearerToken, CoreError, CreatorAssertion, CreatorClaims, CryptoProvider, EncryptedCopy, Grant,
    Identity, IdentityId, IdentityKeypair, IdentityPublicKey, IdentityValue, IdentityValueId,
    NewIdentity, Passframe, Right, RightId, StandardCrypto, Value, ValueId, ValueRecord,
    ValueType, Vault, VaultId,
};
use passvault_directory::{Directory, DirectoryError, MemoryDirectory, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Crypto
// ─────────────────────────────────────────────────────────────────────────────

/// A crypto provider whose encryption can be made to fail.
pub struct FlakyCrypto<C: CryptoProvider = StandardCrypto> {
    inner: C,
    encrypt_calls: AtomicUsize,
    /// 1-based index of the encrypt call to fail, 0 for none.
    fail_at: AtomicUsize,
    refused: Mutex<Vec<IdentityPublicKey>>,
}

impl FlakyCrypto {
    pub fn new() -> Self {
        Self::wrap(StandardCrypto::new())
    }
}

impl Default for FlakyCrypto {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CryptoProvider> FlakyCrypto<C> {
    pub fn wrap(inner: C) -> Self {
        Self {
            inner,
            encrypt_calls: AtomicUsize::new(0),
            fail_at: AtomicUsize::new(0),
            refused: Mutex::new(Vec::new()),
        }
    }

    /// Fail the `k`-th encrypt call from now on (1-based). Resets the count.
    pub fn fail_nth_encrypt(&self, k: usize) {
        self.encrypt_calls.store(0, Ordering::SeqCst);
        self.fail_at.store(k, Ordering::SeqCst);
    }

    /// Fail every encryption to this recipient.
    pub fn refuse_recipient(&self, public_key: IdentityPublicKey) {
        if let Ok(mut refused) = self.refused.lock() {
            refused.push(public_key);
        }
    }

    /// Clear all injected failures.
    pub fn heal(&self) {
        self.fail_at.store(0, Ordering::SeqCst);
        if let Ok(mut refused) = self.refused.lock() {
            refused.clear();
        }
    }

    /// Encrypt calls since creation or the last `fail_nth_encrypt`.
    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    fn is_refused(&self, public_key: &IdentityPublicKey) -> bool {
        self.refused
            .lock()
            .map(|refused| refused.contains(public_key))
            .unwrap_or(false)
    }
}

impl<C: CryptoProvider> CryptoProvider for FlakyCrypto<C> {
    fn generate_keypair(&self) -> IdentityKeypair {
        self.inner.generate_keypair()
    }

    fn derive_identity_id(&self, public_key: &IdentityPublicKey, vault_id: &VaultId) -> IdentityId {
        self.inner.derive_identity_id(public_key, vault_id)
    }

    fn encrypt(
        &self,
        public_key: &IdentityPublicKey,
        plaintext: &[u8],
    ) -> passvault_core::Result<Passframe> {
        let call = self.encrypt_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_at.load(Ordering::SeqCst) {
            return Err(CoreError::EncryptionError(format!(
                "injected failure on call {}",
                call
            )));
        }
        if self.is_refused(public_key) {
            return Err(CoreError::EncryptionError("injected refusal".into()));
        }
        self.inner.encrypt(public_key, plaintext)
    }

    fn decrypt(
        &self,
        keypair: &IdentityKeypair,
        passframe: &Passframe,
    ) -> passvault_core::Result<Vec<u8>> {
        self.inner.decrypt(keypair, passframe)
    }

    fn sign_bearer_token(
        &self,
        keypair: &IdentityKeypair,
        vault_id: &VaultId,
        issued_at: i64,
        ttl_ms: i64,
    ) -> passvault_core::Result<BearerToken> {
        self.inner
            .sign_bearer_token(keypair, vault_id, issued_at, ttl_ms)
    }

    fn sign_creator_assertion(
        &self,
        keypair: &IdentityKeypair,
        subject: &IdentityId,
        vault_id: &VaultId,
        issued_at: i64,
    ) -> passvault_core::Result<CreatorAssertion> {
        self.inner
            .sign_creator_assertion(keypair, subject, vault_id, issued_at)
    }

    fn verify_creator_assertion(
        &self,
        creator_key: &IdentityPublicKey,
        assertion: &CreatorAssertion,
    ) -> passvault_core::Result<CreatorClaims> {
        self.inner.verify_creator_assertion(creator_key, assertion)
    }

    fn decode_creator_assertion(
        &self,
        assertion: &CreatorAssertion,
    ) -> passvault_core::Result<CreatorClaims> {
        self.inner.decode_creator_assertion(assertion)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory
// ─────────────────────────────────────────────────────────────────────────────

/// Directory writes that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryOp {
    CreateVault,
    UpdateVault,
    DeleteVault,
    AddIdentity,
    UpdateIdentity,
    DeleteIdentity,
    AddRights,
    DeleteRight,
    DeleteAllRights,
    CreateValue,
    UpdateValue,
    DeleteValue,
    AddIdentityValues,
    AddIdentityValue,
    UpdateIdentityValue,
    DeleteIdentityValue,
}

/// Wraps a directory, counting successful writes and failing chosen ones.
///
/// Reads always pass through.
pub struct InstrumentedDirectory<D: Directory = MemoryDirectory> {
    inner: D,
    writes: AtomicUsize,
    failing: Mutex<HashSet<DirectoryOp>>,
}

impl InstrumentedDirectory {
    /// Wrap a fresh in-memory directory.
    pub fn memory() -> Self {
        Self::new(MemoryDirectory::new())
    }
}

impl<D: Directory> InstrumentedDirectory<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Make every call of `op` fail with `DirectoryError::Unavailable`.
    pub fn fail(&self, op: DirectoryOp) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(op);
        }
    }

    pub fn heal(&self, op: DirectoryOp) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&op);
        }
    }

    /// Successful writes since creation or the last reset.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_writes(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    fn check(&self, op: DirectoryOp) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(&op))
            .unwrap_or(false);
        if failing {
            return Err(DirectoryError::Unavailable(format!(
                "injected {:?} failure",
                op
            )));
        }
        Ok(())
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

#[async_trait]
impl<D: Directory> Directory for InstrumentedDirectory<D> {
    // ─────────────────────────────────────────────────────────────────────────
    // Vault Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_vault(&self, name: &str, operator_key: &IdentityPublicKey) -> Result<Vault> {
        self.check(DirectoryOp::CreateVault)?;
        self.record(self.inner.create_vault(name, operator_key).await)
    }

    async fn get_vault(&self, vault_id: &VaultId) -> Result<Vault> {
        self.inner.get_vault(vault_id).await
    }

    async fn update_vault(&self, vault_id: &VaultId, name: &str) -> Result<Vault> {
        self.check(DirectoryOp::UpdateVault)?;
        self.record(self.inner.update_vault(vault_id, name).await)
    }

    async fn delete_vault(&self, vault_id: &VaultId) -> Result<()> {
        self.check(DirectoryOp::DeleteVault)?;
        self.record(self.inner.delete_vault(vault_id).await)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn add_identity(&self, vault_id: &VaultId, identity: &NewIdentity) -> Result<Identity> {
        self.check(DirectoryOp::AddIdentity)?;
        self.record(self.inner.add_identity(vault_id, identity).await)
    }

    async fn update_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        name: &str,
    ) -> Result<Identity> {
        self.check(DirectoryOp::UpdateIdentity)?;
        self.record(self.inner.update_identity(vault_id, identity_id, name).await)
    }

    async fn delete_identity(&self, vault_id: &VaultId, identity_id: &IdentityId) -> Result<()> {
        self.check(DirectoryOp::DeleteIdentity)?;
        self.record(self.inner.delete_identity(vault_id, identity_id).await)
    }

    async fn get_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Identity> {
        self.inner.get_identity(vault_id, identity_id).await
    }

    async fn list_identities(&self, vault_id: &VaultId) -> Result<Vec<Identity>> {
        self.inner.list_identities(vault_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rights Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn add_rights(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        grants: &[Grant],
    ) -> Result<Vec<Right>> {
        self.check(DirectoryOp::AddRights)?;
        self.record(self.inner.add_rights(vault_id, identity_id, grants).await)
    }

    async fn list_rights(&self, vault_id: &VaultId, identity_id: &IdentityId) -> Result<Vec<Right>> {
        self.inner.list_rights(vault_id, identity_id).await
    }

    async fn delete_right(&self, vault_id: &VaultId, right_id: &RightId) -> Result<()> {
        self.check(DirectoryOp::DeleteRight)?;
        self.record(self.inner.delete_right(vault_id, right_id).await)
    }

    async fn delete_all_rights_for_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<()> {
        self.check(DirectoryOp::DeleteAllRights)?;
        self.record(
            self.inner
                .delete_all_rights_for_identity(vault_id, identity_id)
                .await,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Value Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_value(
        &self,
        vault_id: &VaultId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value> {
        self.check(DirectoryOp::CreateValue)?;
        self.record(self.inner.create_value(vault_id, name, value_type).await)
    }

    async fn update_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value> {
        self.check(DirectoryOp::UpdateValue)?;
        self.record(
            self.inner
                .update_value(vault_id, value_id, name, value_type)
                .await,
        )
    }

    async fn delete_value(&self, vault_id: &VaultId, value_id: &ValueId) -> Result<()> {
        self.check(DirectoryOp::DeleteValue)?;
        self.record(self.inner.delete_value(vault_id, value_id).await)
    }

    async fn get_value_by_id(&self, vault_id: &VaultId, value_id: &ValueId) -> Result<ValueRecord> {
        self.inner.get_value_by_id(vault_id, value_id).await
    }

    async fn get_value_by_name(&self, vault_id: &VaultId, name: &str) -> Result<ValueRecord> {
        self.inner.get_value_by_name(vault_id, name).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Copy Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn add_identity_values(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        copies: &[EncryptedCopy],
    ) -> Result<Vec<IdentityValue>> {
        self.check(DirectoryOp::AddIdentityValues)?;
        self.record(
            self.inner
                .add_identity_values(vault_id, value_id, copies)
                .await,
        )
    }

    async fn add_identity_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        copy: &EncryptedCopy,
    ) -> Result<IdentityValue> {
        self.check(DirectoryOp::AddIdentityValue)?;
        self.record(self.inner.add_identity_value(vault_id, value_id, copy).await)
    }

    async fn update_identity_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        identity_id: &IdentityId,
        passframe: &Passframe,
    ) -> Result<IdentityValue> {
        self.check(DirectoryOp::UpdateIdentityValue)?;
        self.record(
            self.inner
                .update_identity_value(vault_id, value_id, identity_id, passframe)
                .await,
        )
    }

    async fn delete_identity_value(&self, vault_id: &VaultId, id: &IdentityValueId) -> Result<()> {
        self.check(DirectoryOp::DeleteIdentityValue)?;
        self.record(self.inner.delete_identity_value(vault_id, id).await)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement Queries
    // ─────────────────────────────────────────────────────────────────────────

    async fn list_identities_with_read_access(
        &self,
        vault_id: &VaultId,
        name: &str,
    ) -> Result<Vec<Identity>> {
        self.inner
            .list_identities_with_read_access(vault_id, name)
            .await
    }

    async fn list_values_related_to_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Vec<Value>> {
        self.inner
            .list_values_related_to_identity(vault_id, identity_id)
            .await
    }
}
