//! In-memory implementation of the Directory trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use passvault_core::{
    now_millis, EncryptedCopy, Grant, Identity, IdentityId, IdentityPublicKey, IdentityValue,
    IdentityValueId, NewIdentity, Passframe, Right, RightId, Value, ValueId, ValueRecord,
    ValueType, Vault, VaultId,
};

use crate::error::{DirectoryError, Result};
use crate::matching::grants_value_read;
use crate::traits::{operator_grants, Directory, OPERATOR_NAME};

/// In-memory directory implementation.
///
/// All data is lost when the directory is dropped. Thread-safe via RwLock.
pub struct MemoryDirectory {
    inner: RwLock<HashMap<VaultId, VaultState>>,
}

/// Everything one vault owns.
struct VaultState {
    vault: Vault,
    identities: BTreeMap<IdentityId, Identity>,
    /// Insertion order is listing order.
    rights: Vec<Right>,
    values: HashMap<ValueId, Value>,
    copies: Vec<IdentityValue>,
}

impl VaultState {
    fn identity(&self, id: &IdentityId) -> Result<&Identity> {
        self.identities
            .get(id)
            .ok_or_else(|| DirectoryError::not_found("identity", id))
    }

    fn value(&self, id: &ValueId) -> Result<&Value> {
        self.values
            .get(id)
            .ok_or_else(|| DirectoryError::not_found("value", id))
    }

    fn name_taken(&self, name: &str, except: Option<&ValueId>) -> bool {
        self.values
            .values()
            .any(|v| v.name == name && Some(&v.id) != except)
    }

    fn record(&self, value: &Value) -> ValueRecord {
        let mut copies: Vec<IdentityValue> = self
            .copies
            .iter()
            .filter(|c| c.value_id == value.id)
            .cloned()
            .collect();
        copies.sort_by(|a, b| a.identity_id.cmp(&b.identity_id));
        ValueRecord {
            value: value.clone(),
            copies,
        }
    }

    fn push_rights(&mut self, identity_id: &IdentityId, grants: &[Grant]) -> Vec<Right> {
        let rights: Vec<Right> = grants
            .iter()
            .map(|grant| Right {
                id: RightId::generate(),
                identity_id: *identity_id,
                grant: grant.clone(),
            })
            .collect();
        self.rights.extend(rights.iter().cloned());
        rights
    }
}

impl MemoryDirectory {
    /// Create a new empty in-memory directory.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<VaultId, VaultState>>> {
        self.inner
            .read()
            .map_err(|e| DirectoryError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<VaultId, VaultState>>> {
        self.inner
            .write()
            .map_err(|e| DirectoryError::Unavailable(format!("lock poisoned: {}", e)))
    }

    /// Run `f` against one vault's state.
    fn with_vault<T>(&self, vault_id: &VaultId, f: impl FnOnce(&VaultState) -> Result<T>) -> Result<T> {
        let inner = self.read()?;
        let state = inner
            .get(vault_id)
            .ok_or_else(|| DirectoryError::not_found("vault", vault_id))?;
        f(state)
    }

    fn with_vault_mut<T>(
        &self,
        vault_id: &VaultId,
        f: impl FnOnce(&mut VaultState) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.write()?;
        let state = inner
            .get_mut(vault_id)
            .ok_or_else(|| DirectoryError::not_found("vault", vault_id))?;
        f(state)
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn create_vault(&self, name: &str, operator_key: &IdentityPublicKey) -> Result<Vault> {
        let now = now_millis();
        let vault = Vault {
            id: VaultId::generate(),
            name: name.to_string(),
            operator_key: *operator_key,
            created_at: now,
            updated_at: now,
        };

        let operator = Identity {
            id: IdentityId::derive(operator_key, &vault.id),
            name: OPERATOR_NAME.to_string(),
            public_key: *operator_key,
            creator_verification: None,
            operator: true,
            created_at: now,
        };

        let mut state = VaultState {
            vault: vault.clone(),
            identities: BTreeMap::new(),
            rights: Vec::new(),
            values: HashMap::new(),
            copies: Vec::new(),
        };
        state.push_rights(&operator.id, &operator_grants());
        state.identities.insert(operator.id, operator);

        self.write()?.insert(vault.id, state);
        Ok(vault)
    }

    async fn get_vault(&self, vault_id: &VaultId) -> Result<Vault> {
        self.with_vault(vault_id, |state| Ok(state.vault.clone()))
    }

    async fn update_vault(&self, vault_id: &VaultId, name: &str) -> Result<Vault> {
        self.with_vault_mut(vault_id, |state| {
            state.vault.name = name.to_string();
            state.vault.updated_at = now_millis();
            Ok(state.vault.clone())
        })
    }

    async fn delete_vault(&self, vault_id: &VaultId) -> Result<()> {
        self.write()?
            .remove(vault_id)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::not_found("vault", vault_id))
    }

    async fn add_identity(&self, vault_id: &VaultId, identity: &NewIdentity) -> Result<Identity> {
        if identity.id != IdentityId::derive(&identity.public_key, vault_id) {
            return Err(DirectoryError::InvalidData(format!(
                "identity id {} is not derived from its public key",
                identity.id
            )));
        }

        self.with_vault_mut(vault_id, |state| {
            if state.identities.contains_key(&identity.id) {
                return Err(DirectoryError::Conflict(format!(
                    "identity {} already exists",
                    identity.id
                )));
            }
            let stored = Identity {
                id: identity.id,
                name: identity.name.clone(),
                public_key: identity.public_key,
                creator_verification: Some(identity.creator_verification.clone()),
                operator: false,
                created_at: now_millis(),
            };
            state.identities.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn update_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        name: &str,
    ) -> Result<Identity> {
        self.with_vault_mut(vault_id, |state| {
            let identity = state
                .identities
                .get_mut(identity_id)
                .ok_or_else(|| DirectoryError::not_found("identity", identity_id))?;
            identity.name = name.to_string();
            Ok(identity.clone())
        })
    }

    async fn delete_identity(&self, vault_id: &VaultId, identity_id: &IdentityId) -> Result<()> {
        self.with_vault_mut(vault_id, |state| {
            if state.identity(identity_id)?.is_operator() {
                return Err(DirectoryError::Conflict(
                    "the operator identity cannot be deleted".into(),
                ));
            }
            state.identities.remove(identity_id);
            state.rights.retain(|r| &r.identity_id != identity_id);
            Ok(())
        })
    }

    async fn get_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Identity> {
        self.with_vault(vault_id, |state| state.identity(identity_id).cloned())
    }

    async fn list_identities(&self, vault_id: &VaultId) -> Result<Vec<Identity>> {
        self.with_vault(vault_id, |state| {
            Ok(state.identities.values().cloned().collect())
        })
    }

    async fn add_rights(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        grants: &[Grant],
    ) -> Result<Vec<Right>> {
        self.with_vault_mut(vault_id, |state| {
            state.identity(identity_id)?;
            Ok(state.push_rights(identity_id, grants))
        })
    }

    async fn list_rights(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Vec<Right>> {
        self.with_vault(vault_id, |state| {
            Ok(state
                .rights
                .iter()
                .filter(|r| &r.identity_id == identity_id)
                .cloned()
                .collect())
        })
    }

    async fn delete_right(&self, vault_id: &VaultId, right_id: &RightId) -> Result<()> {
        self.with_vault_mut(vault_id, |state| {
            let before = state.rights.len();
            state.rights.retain(|r| &r.id != right_id);
            if state.rights.len() == before {
                return Err(DirectoryError::not_found("right", right_id));
            }
            Ok(())
        })
    }

    async fn delete_all_rights_for_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<()> {
        self.with_vault_mut(vault_id, |state| {
            state.rights.retain(|r| &r.identity_id != identity_id);
            Ok(())
        })
    }

    async fn create_value(
        &self,
        vault_id: &VaultId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value> {
        self.with_vault_mut(vault_id, |state| {
            if state.name_taken(name, None) {
                return Err(DirectoryError::Conflict(format!(
                    "value name {} is taken",
                    name
                )));
            }
            let now = now_millis();
            let value = Value {
                id: ValueId::generate(),
                name: name.to_string(),
                value_type,
                created_at: now,
                updated_at: now,
            };
            state.values.insert(value.id, value.clone());
            Ok(value)
        })
    }

    async fn update_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value> {
        self.with_vault_mut(vault_id, |state| {
            state.value(value_id)?;
            if state.name_taken(name, Some(value_id)) {
                return Err(DirectoryError::Conflict(format!(
                    "value name {} is taken",
                    name
                )));
            }
            let value = state
                .values
                .get_mut(value_id)
                .ok_or_else(|| DirectoryError::not_found("value", value_id))?;
            value.name = name.to_string();
            value.value_type = value_type;
            value.updated_at = now_millis();
            Ok(value.clone())
        })
    }

    async fn delete_value(&self, vault_id: &VaultId, value_id: &ValueId) -> Result<()> {
        self.with_vault_mut(vault_id, |state| {
            state
                .values
                .remove(value_id)
                .ok_or_else(|| DirectoryError::not_found("value", value_id))?;
            state.copies.retain(|c| &c.value_id != value_id);
            Ok(())
        })
    }

    async fn get_value_by_id(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
    ) -> Result<ValueRecord> {
        self.with_vault(vault_id, |state| Ok(state.record(state.value(value_id)?)))
    }

    async fn get_value_by_name(&self, vault_id: &VaultId, name: &str) -> Result<ValueRecord> {
        self.with_vault(vault_id, |state| {
            let value = state
                .values
                .values()
                .find(|v| v.name == name)
                .ok_or_else(|| DirectoryError::not_found("value", name))?;
            Ok(state.record(value))
        })
    }

    async fn add_identity_values(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        copies: &[EncryptedCopy],
    ) -> Result<Vec<IdentityValue>> {
        self.with_vault_mut(vault_id, |state| {
            state.value(value_id)?;

            // Validate the whole batch before touching anything.
            for (i, copy) in copies.iter().enumerate() {
                state.identity(&copy.identity_id)?;
                let held = state
                    .copies
                    .iter()
                    .any(|c| &c.value_id == value_id && c.identity_id == copy.identity_id);
                let repeated = copies[..i].iter().any(|c| c.identity_id == copy.identity_id);
                if held || repeated {
                    return Err(DirectoryError::Conflict(format!(
                        "identity {} already holds a copy of value {}",
                        copy.identity_id, value_id
                    )));
                }
            }

            let stored: Vec<IdentityValue> = copies
                .iter()
                .map(|copy| IdentityValue {
                    id: IdentityValueId::generate(),
                    value_id: *value_id,
                    identity_id: copy.identity_id,
                    passframe: copy.passframe.clone(),
                })
                .collect();
            state.copies.extend(stored.iter().cloned());
            Ok(stored)
        })
    }

    async fn update_identity_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        identity_id: &IdentityId,
        passframe: &Passframe,
    ) -> Result<IdentityValue> {
        self.with_vault_mut(vault_id, |state| {
            let copy = state
                .copies
                .iter_mut()
                .find(|c| &c.value_id == value_id && &c.identity_id == identity_id)
                .ok_or_else(|| DirectoryError::not_found("identity value", identity_id))?;
            copy.passframe = passframe.clone();
            Ok(copy.clone())
        })
    }

    async fn delete_identity_value(
        &self,
        vault_id: &VaultId,
        id: &IdentityValueId,
    ) -> Result<()> {
        self.with_vault_mut(vault_id, |state| {
            let before = state.copies.len();
            state.copies.retain(|c| &c.id != id);
            if state.copies.len() == before {
                return Err(DirectoryError::not_found("identity value", id));
            }
            Ok(())
        })
    }

    async fn list_identities_with_read_access(
        &self,
        vault_id: &VaultId,
        name: &str,
    ) -> Result<Vec<Identity>> {
        self.with_vault(vault_id, |state| {
            Ok(state
                .identities
                .values()
                .filter(|identity| {
                    state
                        .rights
                        .iter()
                        .any(|r| r.identity_id == identity.id && grants_value_read(&r.grant, name))
                })
                .cloned()
                .collect())
        })
    }

    async fn list_values_related_to_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Vec<Value>> {
        self.with_vault(vault_id, |state| {
            let mut values: Vec<Value> = state
                .copies
                .iter()
                .filter(|c| &c.identity_id == identity_id)
                .filter_map(|c| state.values.get(&c.value_id).cloned())
                .collect();
            values.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(values)
        })
    }
}
