//! Value operations.
//!
//! A value's secret is never stored in the clear: each entitled identity
//! holds its own encrypted copy. Creating a value fans the secret out to
//! every entitled identity, updating re-encrypts every existing copy, and
//! syncing adds or removes copies until the holders match the identities
//! whose rights grant read access to the value's name.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use passvault_core::{
    CryptoProvider, EncryptedCopy, IdentityId, IdentityKeypair, IdentityPublicKey, Secret, Value,
    ValueId, ValueRecord, ValueType,
};
use passvault_directory::Directory;
use passvault_perms::{validate_value_name, ChainVerifier};

use crate::error::{AggregateError, Result, VaultError};
use crate::vault::Vault;

/// What a sync changed: holders whose copies were added or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: Vec<IdentityId>,
    pub removed: Vec<IdentityId>,
}

impl SyncReport {
    /// True when the copy set already matched the entitled set.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// What an update did to a value's copies.
///
/// Copies held by identities that no longer exist are deleted rather than
/// re-encrypted; a later sync gives a re-admitted key a fresh copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub reencrypted: Vec<IdentityId>,
    pub removed: Vec<IdentityId>,
}

/// A value together with the caller's decrypted secret.
#[derive(Debug, Clone)]
pub struct DecryptedValue {
    pub value: Value,
    pub secret: Secret,
}

impl<D: Directory, C: CryptoProvider> Vault<D, C> {
    // ─────────────────────────────────────────────────────────────────────────
    // Value Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a value and give every entitled identity a copy of its secret.
    ///
    /// The caller must be among the entitled identities. Either every copy is
    /// stored or the value is deleted again.
    pub async fn add_value(
        &self,
        caller: &IdentityKeypair,
        name: &str,
        secret: &Secret,
        value_type: ValueType,
    ) -> Result<ValueId> {
        validate_value_name(name).map_err(VaultError::InvalidName)?;

        let entitled = self
            .directory
            .list_identities_with_read_access(&self.vault_id, name)
            .await?;
        let caller_id = self.identity_id_of(caller);
        if !entitled.iter().any(|identity| identity.id == caller_id) {
            return Err(VaultError::unauthorized(format!(
                "identity {} has no read right on {}",
                caller_id, name
            )));
        }

        let value = self
            .directory
            .create_value(&self.vault_id, name, value_type)
            .await?;

        let mut copies = Vec::with_capacity(entitled.len());
        for identity in &entitled {
            match self.crypto.encrypt(&identity.public_key, secret.as_bytes()) {
                Ok(passframe) => copies.push(EncryptedCopy {
                    identity_id: identity.id,
                    passframe,
                }),
                Err(source) => {
                    let err = VaultError::Encryption {
                        identity: identity.id,
                        source,
                    };
                    return Err(self.roll_back_value(&value.id, err).await);
                }
            }
        }

        if let Err(err) = self
            .directory
            .add_identity_values(&self.vault_id, &value.id, &copies)
            .await
        {
            return Err(self.roll_back_value(&value.id, err.into()).await);
        }

        info!(value = %value.id, copies = copies.len(), "value created");
        Ok(value.id)
    }

    /// Rename or retype a value and re-encrypt the new secret for every
    /// current holder.
    ///
    /// Holders are not reconciled against rights here; that is sync's job.
    /// Copies whose holder identity is gone are deleted. Every holder is
    /// attempted. Failures are collected into [`VaultError::Aggregate`] and
    /// the copies that did succeed are kept.
    pub async fn update_value(
        &self,
        caller: &IdentityKeypair,
        value_id: &ValueId,
        name: &str,
        secret: &Secret,
        value_type: ValueType,
    ) -> Result<UpdateReport> {
        validate_value_name(name).map_err(VaultError::InvalidName)?;

        let record = self
            .directory
            .get_value_by_id(&self.vault_id, value_id)
            .await?;
        let caller_id = self.identity_id_of(caller);
        if !record.is_held_by(&caller_id) {
            return Err(VaultError::unauthorized(format!(
                "identity {} holds no copy of {}",
                caller_id, record.value.name
            )));
        }

        self.directory
            .update_value(&self.vault_id, value_id, name, value_type)
            .await?;

        let keys: HashMap<IdentityId, IdentityPublicKey> = self
            .directory
            .list_identities(&self.vault_id)
            .await?
            .into_iter()
            .map(|identity| (identity.id, identity.public_key))
            .collect();

        let mut report = UpdateReport::default();
        let mut causes = Vec::new();
        for copy in &record.copies {
            let holder = copy.identity_id;
            let Some(public_key) = keys.get(&holder) else {
                match self
                    .directory
                    .delete_identity_value(&self.vault_id, &copy.id)
                    .await
                {
                    Ok(()) => report.removed.push(holder),
                    Err(source) => causes.push(VaultError::Persistence {
                        identity: holder,
                        source,
                    }),
                }
                continue;
            };

            let passframe = match self.crypto.encrypt(public_key, secret.as_bytes()) {
                Ok(passframe) => passframe,
                Err(source) => {
                    causes.push(VaultError::Encryption {
                        identity: holder,
                        source,
                    });
                    continue;
                }
            };

            match self
                .directory
                .update_identity_value(&self.vault_id, value_id, &holder, &passframe)
                .await
            {
                Ok(_) => report.reencrypted.push(holder),
                Err(source) => causes.push(VaultError::Persistence {
                    identity: holder,
                    source,
                }),
            }
        }

        if !report.removed.is_empty() {
            info!(
                value = %value_id,
                removed = report.removed.len(),
                "dropped copies of deleted identities"
            );
        }

        if !causes.is_empty() {
            warn!(
                value = %value_id,
                failed = causes.len(),
                holders = record.copies.len(),
                "value updated, some copies were not re-encrypted"
            );
            return Err(VaultError::Aggregate(AggregateError { causes }));
        }

        info!(value = %value_id, copies = report.reencrypted.len(), "value updated");
        Ok(report)
    }

    /// Make a value's holders match the identities entitled to read it.
    ///
    /// Every entitled identity's creator chain is verified first, with the
    /// entitled identities themselves as the peer set. The caller must be
    /// entitled and must hold a copy, since the secret is re-encrypted from
    /// the caller's own copy. Fails on the first error; copies written
    /// before it are kept, and running sync again picks up where it stopped.
    pub async fn sync_value(
        &self,
        caller: &IdentityKeypair,
        value_id: &ValueId,
    ) -> Result<SyncReport> {
        let record = self
            .directory
            .get_value_by_id(&self.vault_id, value_id)
            .await?;
        let entitled = self
            .directory
            .list_identities_with_read_access(&self.vault_id, &record.value.name)
            .await?;

        let caller_id = self.identity_id_of(caller);
        let entitled_ids: HashSet<IdentityId> = entitled.iter().map(|i| i.id).collect();
        if !entitled_ids.contains(&caller_id) {
            return Err(VaultError::unauthorized(format!(
                "identity {} has no read right on {}",
                caller_id, record.value.name
            )));
        }

        if let Err(err) = ChainVerifier::new(&self.crypto).verify_all(&entitled) {
            warn!(value = %value_id, error = %err, "trust chain rejected, value not synced");
            return Err(err.into());
        }

        let secret = self.open_copy(caller, &caller_id, &record)?;

        let mut report = SyncReport::default();
        for identity in &entitled {
            if record.is_held_by(&identity.id) {
                continue;
            }
            let passframe = self
                .crypto
                .encrypt(&identity.public_key, secret.as_bytes())
                .map_err(|source| VaultError::Encryption {
                    identity: identity.id,
                    source,
                })?;
            self.directory
                .add_identity_value(
                    &self.vault_id,
                    value_id,
                    &EncryptedCopy {
                        identity_id: identity.id,
                        passframe,
                    },
                )
                .await
                .map_err(|source| VaultError::Persistence {
                    identity: identity.id,
                    source,
                })?;
            report.added.push(identity.id);
        }

        for copy in &record.copies {
            if entitled_ids.contains(&copy.identity_id) {
                continue;
            }
            self.directory
                .delete_identity_value(&self.vault_id, &copy.id)
                .await
                .map_err(|source| VaultError::Persistence {
                    identity: copy.identity_id,
                    source,
                })?;
            report.removed.push(copy.identity_id);
        }

        if report.is_noop() {
            debug!(value = %value_id, "value already in sync");
        } else {
            info!(
                value = %value_id,
                added = report.added.len(),
                removed = report.removed.len(),
                "value synced"
            );
        }
        Ok(report)
    }

    /// Sync every value the identity holds a copy of, in name order.
    pub async fn sync_values(
        &self,
        caller: &IdentityKeypair,
        identity_id: &IdentityId,
    ) -> Result<Vec<(ValueId, SyncReport)>> {
        let values = self.related_values(identity_id).await?;
        let mut reports = Vec::with_capacity(values.len());
        for value in values {
            let report = self.sync_value(caller, &value.id).await?;
            reports.push((value.id, report));
        }
        Ok(reports)
    }

    /// Read a value and decrypt the caller's copy.
    pub async fn get_value(
        &self,
        caller: &IdentityKeypair,
        value_id: &ValueId,
    ) -> Result<DecryptedValue> {
        let record = self
            .directory
            .get_value_by_id(&self.vault_id, value_id)
            .await?;
        self.decrypt_record(caller, record)
    }

    pub async fn get_value_by_name(
        &self,
        caller: &IdentityKeypair,
        name: &str,
    ) -> Result<DecryptedValue> {
        let record = self
            .directory
            .get_value_by_name(&self.vault_id, name)
            .await?;
        self.decrypt_record(caller, record)
    }

    /// Delete a value and all of its copies.
    ///
    /// Only a holder of the value may delete it.
    pub async fn delete_value(&self, caller: &IdentityKeypair, value_id: &ValueId) -> Result<()> {
        let record = self
            .directory
            .get_value_by_id(&self.vault_id, value_id)
            .await?;
        let caller_id = self.identity_id_of(caller);
        if !record.is_held_by(&caller_id) {
            return Err(VaultError::unauthorized(format!(
                "identity {} holds no copy of {}",
                caller_id, record.value.name
            )));
        }

        self.directory
            .delete_value(&self.vault_id, value_id)
            .await?;
        info!(value = %value_id, "value deleted");
        Ok(())
    }

    /// Values the identity holds a copy of, ordered by name.
    pub async fn related_values(&self, identity_id: &IdentityId) -> Result<Vec<Value>> {
        Ok(self
            .directory
            .list_values_related_to_identity(&self.vault_id, identity_id)
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn decrypt_record(&self, caller: &IdentityKeypair, record: ValueRecord) -> Result<DecryptedValue> {
        let caller_id = self.identity_id_of(caller);
        let secret = self.open_copy(caller, &caller_id, &record)?;
        Ok(DecryptedValue {
            value: record.value,
            secret,
        })
    }

    fn open_copy(
        &self,
        caller: &IdentityKeypair,
        caller_id: &IdentityId,
        record: &ValueRecord,
    ) -> Result<Secret> {
        let copy = record.copy_for(caller_id).ok_or_else(|| {
            VaultError::unauthorized(format!(
                "identity {} holds no copy of {}",
                caller_id, record.value.name
            ))
        })?;
        Ok(Secret::new(self.crypto.decrypt(caller, &copy.passframe)?))
    }

    async fn roll_back_value(&self, value_id: &ValueId, original: VaultError) -> VaultError {
        match self.directory.delete_value(&self.vault_id, value_id).await {
            Ok(()) => {
                warn!(value = %value_id, error = %original, "value creation failed, rolled back");
                original
            }
            Err(rollback) => {
                warn!(
                    value = %value_id,
                    error = %original,
                    rollback_error = %rollback,
                    "value creation failed and rollback failed"
                );
                VaultError::RollbackFailed {
                    original: Box::new(original),
                    rollback: Box::new(rollback.into()),
                }
            }
        }
    }
}
