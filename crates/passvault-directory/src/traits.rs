//! Directory trait: the abstract interface to the vault's system of record.
//!
//! The directory owns every vault, identity, right, value and copy. The
//! engine fetches what it needs per call and never caches records. Backends
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use passvault_core::{
    Direction, EncryptedCopy, Grant, Identity, IdentityId, IdentityPublicKey, IdentityValue,
    IdentityValueId, NewIdentity, Passframe, Right, RightId, RightTarget, Value, ValueId,
    ValueRecord, ValueType, Vault, VaultId,
};

use crate::error::Result;

/// Name given to the operator identity created with a vault.
pub const OPERATOR_NAME: &str = "operator";

/// Rights the operator identity receives at vault creation: every direction
/// on every target.
pub fn operator_grants() -> Vec<Grant> {
    let mut grants = Vec::with_capacity(9);
    for target in [RightTarget::Values, RightTarget::Identity, RightTarget::System] {
        for direction in [Direction::Read, Direction::Write, Direction::Delete] {
            grants.push(Grant {
                direction,
                target,
                pattern: format!("{}.>", target.as_str()),
            });
        }
    }
    grants
}

/// The Directory trait: async interface to vault state.
///
/// Every call is scoped by a [`VaultId`]; records of one vault are never
/// visible through another. Missing records are reported as
/// [`DirectoryError::NotFound`](crate::DirectoryError::NotFound), uniqueness
/// violations as [`DirectoryError::Conflict`](crate::DirectoryError::Conflict).
///
/// # Design Notes
///
/// - **Names are unique**: at most one value per name within a vault.
/// - **One copy per holder**: at most one [`IdentityValue`] per (value, identity).
/// - **Batch copies are atomic**: `add_identity_values` stores all or none.
/// - **Identity removal is partial**: deleting an identity removes its rights
///   but leaves its copies for the next sync to reconcile.
/// - **No caller checks**: backends store what they are given. Rights are
///   enforced by the engine before it calls in.
#[async_trait]
pub trait Directory: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Vault Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a vault and its operator identity.
    ///
    /// The operator's id is `IdentityId::derive(operator_key, vault.id)` and
    /// it receives [`operator_grants`].
    async fn create_vault(&self, name: &str, operator_key: &IdentityPublicKey) -> Result<Vault>;

    async fn get_vault(&self, vault_id: &VaultId) -> Result<Vault>;

    /// Rename a vault.
    async fn update_vault(&self, vault_id: &VaultId, name: &str) -> Result<Vault>;

    /// Delete a vault and everything in it.
    async fn delete_vault(&self, vault_id: &VaultId) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Identity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Admit an identity.
    ///
    /// Fails with `InvalidData` if `identity.id` is not derived from its
    /// public key and this vault, `Conflict` if it already exists.
    async fn add_identity(&self, vault_id: &VaultId, identity: &NewIdentity) -> Result<Identity>;

    /// Rename an identity.
    async fn update_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        name: &str,
    ) -> Result<Identity>;

    /// Remove an identity and its rights. Its copies stay until a sync.
    async fn delete_identity(&self, vault_id: &VaultId, identity_id: &IdentityId) -> Result<()>;

    async fn get_identity(&self, vault_id: &VaultId, identity_id: &IdentityId)
        -> Result<Identity>;

    /// All identities in a vault, ordered by id.
    async fn list_identities(&self, vault_id: &VaultId) -> Result<Vec<Identity>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Rights Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach grants to an identity.
    async fn add_rights(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        grants: &[Grant],
    ) -> Result<Vec<Right>>;

    /// Rights held by an identity, in insertion order.
    async fn list_rights(&self, vault_id: &VaultId, identity_id: &IdentityId)
        -> Result<Vec<Right>>;

    async fn delete_right(&self, vault_id: &VaultId, right_id: &RightId) -> Result<()>;

    async fn delete_all_rights_for_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Value Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a value with no copies. Fails with `Conflict` on a taken name.
    async fn create_value(
        &self,
        vault_id: &VaultId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value>;

    /// Change a value's name and type.
    async fn update_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value>;

    /// Delete a value and all of its copies.
    async fn delete_value(&self, vault_id: &VaultId, value_id: &ValueId) -> Result<()>;

    /// A value and its copies, ordered by holder id.
    async fn get_value_by_id(&self, vault_id: &VaultId, value_id: &ValueId)
        -> Result<ValueRecord>;

    /// A value and its copies, looked up by name.
    async fn get_value_by_name(&self, vault_id: &VaultId, name: &str) -> Result<ValueRecord>;

    // ─────────────────────────────────────────────────────────────────────────
    // Copy Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store copies of a value. All are stored or none.
    ///
    /// Every holder must be an identity of the vault, and none may already
    /// hold a copy of the value (`Conflict`).
    async fn add_identity_values(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        copies: &[EncryptedCopy],
    ) -> Result<Vec<IdentityValue>>;

    /// Store one copy of a value.
    async fn add_identity_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        copy: &EncryptedCopy,
    ) -> Result<IdentityValue> {
        let mut stored = self
            .add_identity_values(vault_id, value_id, std::slice::from_ref(copy))
            .await?;
        stored
            .pop()
            .ok_or_else(|| crate::DirectoryError::InvalidData("batch insert returned no rows".into()))
    }

    /// Overwrite the ciphertext of an identity's copy.
    async fn update_identity_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        identity_id: &IdentityId,
        passframe: &Passframe,
    ) -> Result<IdentityValue>;

    async fn delete_identity_value(&self, vault_id: &VaultId, id: &IdentityValueId)
        -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Identities holding a `VALUES` read right whose pattern matches `name`,
    /// ordered by id.
    async fn list_identities_with_read_access(
        &self,
        vault_id: &VaultId,
        name: &str,
    ) -> Result<Vec<Identity>>;

    /// Values the identity currently holds a copy of, ordered by name.
    async fn list_values_related_to_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Vec<Value>>;
}
