//! The Vault: a client engine bound to one vault in a directory.
//!
//! The Vault brings together the directory, the crypto provider and the
//! rights parser. It holds no key material: every acting operation takes the
//! caller's keypair for the duration of that one call.

use std::sync::Arc;

use tracing::{info, warn};

use passvault_core::{
    now_millis, BearerToken, CryptoProvider, Direction, Grant, Identity, IdentityId,
    IdentityKeypair, IdentityPublicKey, NewIdentity, Right, RightId, RightTarget, StandardCrypto,
    Vault as VaultRecord, VaultId,
};
use passvault_directory::Directory;
use passvault_perms::parse_all;

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

/// An identity as admitted, with the rights it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedIdentity {
    pub identity: Identity,
    pub rights: Vec<Right>,
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Creating, renaming and deleting the vault
/// - Admitting identities and managing their rights
/// - Creating, updating, reading and syncing values
/// - Minting bearer tokens for the transport layer
pub struct Vault<D: Directory, C: CryptoProvider = StandardCrypto> {
    pub(crate) directory: Arc<D>,
    pub(crate) crypto: C,
    pub(crate) vault_id: VaultId,
    pub(crate) config: VaultConfig,
}

impl<D: Directory, C: CryptoProvider> Vault<D, C> {
    /// Create a vault with a freshly generated operator keypair.
    ///
    /// The operator's keypair is returned to the caller and not kept.
    pub async fn create(
        directory: Arc<D>,
        crypto: C,
        name: &str,
        config: VaultConfig,
    ) -> Result<(Self, IdentityKeypair)> {
        let operator = crypto.generate_keypair();
        let vault =
            Self::create_with_key(directory, crypto, name, &operator.public_key(), config).await?;
        Ok((vault, operator))
    }

    /// Create a vault whose operator is an existing public key.
    pub async fn create_with_key(
        directory: Arc<D>,
        crypto: C,
        name: &str,
        operator_key: &IdentityPublicKey,
        config: VaultConfig,
    ) -> Result<Self> {
        let record = directory.create_vault(name, operator_key).await?;
        info!(vault = %record.id, "vault created");
        Ok(Self {
            directory,
            crypto,
            vault_id: record.id,
            config,
        })
    }

    /// Bind to an existing vault.
    pub async fn open(
        directory: Arc<D>,
        crypto: C,
        vault_id: VaultId,
        config: VaultConfig,
    ) -> Result<Self> {
        directory.get_vault(&vault_id).await?;
        Ok(Self {
            directory,
            crypto,
            vault_id,
            config,
        })
    }

    pub fn id(&self) -> VaultId {
        self.vault_id
    }

    /// Get the directory reference.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The identity id a keypair has in this vault.
    pub fn identity_id_of(&self, keypair: &IdentityKeypair) -> IdentityId {
        self.crypto
            .derive_identity_id(&keypair.public_key(), &self.vault_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Vault Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the vault record.
    pub async fn info(&self) -> Result<VaultRecord> {
        Ok(self.directory.get_vault(&self.vault_id).await?)
    }

    pub async fn rename(&self, name: &str) -> Result<VaultRecord> {
        Ok(self.directory.update_vault(&self.vault_id, name).await?)
    }

    /// Delete the vault and everything in it.
    pub async fn delete(self) -> Result<()> {
        self.directory.delete_vault(&self.vault_id).await?;
        info!(vault = %self.vault_id, "vault deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Admit an identity on the caller's authority.
    ///
    /// The caller needs a write right on `IDENTITY` and signs a creator
    /// assertion for the new identity. If its rights cannot be stored, the
    /// identity is removed again.
    pub async fn add_identity(
        &self,
        caller: &IdentityKeypair,
        name: &str,
        public_key: &IdentityPublicKey,
        patterns: &[&str],
    ) -> Result<AddedIdentity> {
        let grants = parse_all(patterns.iter().copied())?;
        self.authorize_identity_change(caller, Direction::Write).await?;

        let id = self.crypto.derive_identity_id(public_key, &self.vault_id);
        let creator_verification =
            self.crypto
                .sign_creator_assertion(caller, &id, &self.vault_id, now_millis())?;

        let identity = self
            .directory
            .add_identity(
                &self.vault_id,
                &NewIdentity {
                    id,
                    name: name.to_string(),
                    public_key: *public_key,
                    creator_verification,
                },
            )
            .await?;

        let rights = match self.directory.add_rights(&self.vault_id, &id, &grants).await {
            Ok(rights) => rights,
            Err(err) => return Err(self.roll_back_identity(&id, err.into()).await),
        };

        info!(identity = %id, rights = rights.len(), "identity added");
        self.resync(caller).await?;
        Ok(AddedIdentity { identity, rights })
    }

    /// Generate a keypair and admit it. The keypair is returned, not kept.
    pub async fn create_identity(
        &self,
        caller: &IdentityKeypair,
        name: &str,
        patterns: &[&str],
    ) -> Result<(AddedIdentity, IdentityKeypair)> {
        let keypair = self.crypto.generate_keypair();
        let added = self
            .add_identity(caller, name, &keypair.public_key(), patterns)
            .await?;
        Ok((added, keypair))
    }

    /// Rename an identity and replace all of its rights. The caller needs a
    /// write right on `IDENTITY`.
    pub async fn update_identity(
        &self,
        caller: &IdentityKeypair,
        identity_id: &IdentityId,
        name: &str,
        patterns: &[&str],
    ) -> Result<AddedIdentity> {
        let grants = parse_all(patterns.iter().copied())?;
        self.authorize_identity_change(caller, Direction::Write).await?;

        let identity = self
            .directory
            .update_identity(&self.vault_id, identity_id, name)
            .await?;
        self.directory
            .delete_all_rights_for_identity(&self.vault_id, identity_id)
            .await?;
        let rights = self
            .directory
            .add_rights(&self.vault_id, identity_id, &grants)
            .await?;

        info!(identity = %identity_id, rights = rights.len(), "identity updated");
        self.resync(caller).await?;
        Ok(AddedIdentity { identity, rights })
    }

    /// Remove an identity and its rights. The caller needs a delete right on
    /// `IDENTITY`.
    ///
    /// Its copies are left for sync to remove; with
    /// `sync_on_identity_change` that happens here for every value the
    /// caller holds.
    pub async fn delete_identity(
        &self,
        caller: &IdentityKeypair,
        identity_id: &IdentityId,
    ) -> Result<()> {
        self.authorize_identity_change(caller, Direction::Delete).await?;
        self.directory
            .delete_identity(&self.vault_id, identity_id)
            .await?;
        info!(identity = %identity_id, "identity deleted");
        self.resync(caller).await
    }

    pub async fn get_identity(&self, identity_id: &IdentityId) -> Result<Identity> {
        Ok(self
            .directory
            .get_identity(&self.vault_id, identity_id)
            .await?)
    }

    pub async fn list_identities(&self) -> Result<Vec<Identity>> {
        Ok(self.directory.list_identities(&self.vault_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rights Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Parse patterns and attach them to an identity. Nothing is stored if
    /// any pattern is malformed.
    pub async fn add_rights(
        &self,
        identity_id: &IdentityId,
        patterns: &[&str],
    ) -> Result<Vec<Right>> {
        let grants: Vec<Grant> = parse_all(patterns.iter().copied())?;
        Ok(self
            .directory
            .add_rights(&self.vault_id, identity_id, &grants)
            .await?)
    }

    pub async fn list_rights(&self, identity_id: &IdentityId) -> Result<Vec<Right>> {
        Ok(self
            .directory
            .list_rights(&self.vault_id, identity_id)
            .await?)
    }

    pub async fn delete_right(&self, right_id: &RightId) -> Result<()> {
        Ok(self.directory.delete_right(&self.vault_id, right_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    /// Mint a bearer token for the caller, valid for `config.token_ttl`.
    pub fn bearer_token(&self, caller: &IdentityKeypair) -> Result<BearerToken> {
        let ttl_ms = i64::try_from(self.config.token_ttl.as_millis()).unwrap_or(i64::MAX);
        Ok(self
            .crypto
            .sign_bearer_token(caller, &self.vault_id, now_millis(), ttl_ms)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn roll_back_identity(&self, identity_id: &IdentityId, original: VaultError) -> VaultError {
        match self
            .directory
            .delete_identity(&self.vault_id, identity_id)
            .await
        {
            Ok(()) => {
                warn!(identity = %identity_id, error = %original, "adding rights failed, identity rolled back");
                original
            }
            Err(rollback) => {
                warn!(
                    identity = %identity_id,
                    error = %original,
                    rollback_error = %rollback,
                    "adding rights failed and identity rollback failed"
                );
                VaultError::RollbackFailed {
                    original: Box::new(original),
                    rollback: Box::new(rollback.into()),
                }
            }
        }
    }

    /// Directories do not authenticate callers, so identity changes are
    /// gated here on the caller's own `IDENTITY` rights.
    async fn authorize_identity_change(
        &self,
        caller: &IdentityKeypair,
        direction: Direction,
    ) -> Result<()> {
        let caller_id = self.identity_id_of(caller);
        let rights = match self.directory.list_rights(&self.vault_id, &caller_id).await {
            Ok(rights) => rights,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let allowed = rights.iter().any(|right| {
            right.grant.target == RightTarget::Identity && right.grant.direction == direction
        });
        if !allowed {
            return Err(VaultError::unauthorized(format!(
                "identity {} has no {} right on {}",
                caller_id,
                direction.as_char(),
                RightTarget::Identity.as_str()
            )));
        }
        Ok(())
    }

    /// Reconcile the caller's values after a rights change, if configured.
    async fn resync(&self, caller: &IdentityKeypair) -> Result<()> {
        if !self.config.sync_on_identity_change {
            return Ok(());
        }
        let caller_id = self.identity_id_of(caller);
        self.sync_values(caller, &caller_id).await?;
        Ok(())
    }
}
