//! SQLite implementation of the Directory trait.
//!
//! This is the primary directory backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. Cascades are enforced
//! by foreign keys, so `PRAGMA foreign_keys` is switched on per connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use passvault_core::{
    now_millis, CreatorAssertion, Direction, EncryptedCopy, Grant, Identity, IdentityId,
    IdentityPublicKey, IdentityValue, IdentityValueId, NewIdentity, Passframe, Right, RightId,
    RightTarget, Value, ValueId, ValueRecord, ValueType, Vault, VaultId,
};

use crate::error::{DirectoryError, Result};
use crate::matching::subject_matches;
use crate::migration;
use crate::traits::{operator_grants, Directory, OPERATOR_NAME};

/// SQLite-based directory implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDirectory {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` on the connection from the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| DirectoryError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DirectoryError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

const IDENTITY_COLUMNS: &str =
    "i.identity_id, i.name, i.public_key, i.creator_verification, i.operator, i.created_at";

const VALUE_COLUMNS: &str = "v.value_id, v.name, v.value_type, v.created_at, v.updated_at";

fn invalid(column: &str, ty: Type) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(0, column.to_string(), ty)
}

fn blob_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: for<'a> TryFrom<&'a [u8]>,
{
    let bytes: Vec<u8> = row.get(column)?;
    T::try_from(bytes.as_slice()).map_err(|_| invalid(column, Type::Blob))
}

fn row_to_vault(row: &Row<'_>) -> rusqlite::Result<Vault> {
    let key: Vec<u8> = row.get("operator_key")?;
    Ok(Vault {
        id: blob_column(row, "vault_id")?,
        name: row.get("name")?,
        operator_key: IdentityPublicKey::from_bytes(&key)
            .map_err(|_| invalid("operator_key", Type::Blob))?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_identity(row: &Row<'_>) -> rusqlite::Result<Identity> {
    let key: Vec<u8> = row.get("public_key")?;
    let assertion: Option<Vec<u8>> = row.get("creator_verification")?;

    Ok(Identity {
        id: blob_column(row, "identity_id")?,
        name: row.get("name")?,
        public_key: IdentityPublicKey::from_bytes(&key)
            .map_err(|_| invalid("public_key", Type::Blob))?,
        creator_verification: assertion
            .map(|bytes| CreatorAssertion::from_bytes(&bytes))
            .transpose()
            .map_err(|_| invalid("creator_verification", Type::Blob))?,
        operator: row.get("operator")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_right(row: &Row<'_>) -> rusqlite::Result<Right> {
    let direction: String = row.get("direction")?;
    let target: String = row.get("target")?;

    Ok(Right {
        id: blob_column(row, "right_id")?,
        identity_id: blob_column(row, "identity_id")?,
        grant: Grant {
            direction: direction
                .chars()
                .next()
                .and_then(Direction::from_char)
                .ok_or_else(|| invalid("direction", Type::Text))?,
            target: RightTarget::parse(&target).ok_or_else(|| invalid("target", Type::Text))?,
            pattern: row.get("pattern")?,
        },
    })
}

fn row_to_value(row: &Row<'_>) -> rusqlite::Result<Value> {
    let value_type: String = row.get("value_type")?;
    Ok(Value {
        id: blob_column(row, "value_id")?,
        name: row.get("name")?,
        value_type: ValueType::parse(&value_type)
            .ok_or_else(|| invalid("value_type", Type::Text))?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_copy(row: &Row<'_>) -> rusqlite::Result<IdentityValue> {
    let passframe: Vec<u8> = row.get("passframe")?;
    Ok(IdentityValue {
        id: blob_column(row, "identity_value_id")?,
        value_id: blob_column(row, "value_id")?,
        identity_id: blob_column(row, "identity_id")?,
        passframe: Passframe::from_bytes(passframe),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries shared by several operations
// ─────────────────────────────────────────────────────────────────────────────

fn load_vault(conn: &Connection, vault_id: &VaultId) -> Result<Vault> {
    conn.query_row(
        "SELECT vault_id, name, operator_key, created_at, updated_at
         FROM vaults WHERE vault_id = ?1",
        params![&vault_id.0[..]],
        row_to_vault,
    )
    .optional()?
    .ok_or_else(|| DirectoryError::not_found("vault", vault_id))
}

fn load_identity(conn: &Connection, vault_id: &VaultId, identity_id: &IdentityId) -> Result<Identity> {
    load_vault(conn, vault_id)?;
    conn.query_row(
        &format!(
            "SELECT {} FROM identities i WHERE i.vault_id = ?1 AND i.identity_id = ?2",
            IDENTITY_COLUMNS
        ),
        params![&vault_id.0[..], &identity_id.0[..]],
        row_to_identity,
    )
    .optional()?
    .ok_or_else(|| DirectoryError::not_found("identity", identity_id))
}

fn load_value(conn: &Connection, vault_id: &VaultId, value_id: &ValueId) -> Result<Value> {
    load_vault(conn, vault_id)?;
    conn.query_row(
        &format!(
            "SELECT {} FROM secret_values v WHERE v.vault_id = ?1 AND v.value_id = ?2",
            VALUE_COLUMNS
        ),
        params![&vault_id.0[..], &value_id.0[..]],
        row_to_value,
    )
    .optional()?
    .ok_or_else(|| DirectoryError::not_found("value", value_id))
}

fn load_record(conn: &Connection, value: Value) -> Result<ValueRecord> {
    let mut stmt = conn.prepare(
        "SELECT identity_value_id, value_id, identity_id, passframe
         FROM identity_values WHERE value_id = ?1 ORDER BY identity_id",
    )?;
    let copies = stmt
        .query_map(params![&value.id.0[..]], row_to_copy)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ValueRecord { value, copies })
}

fn name_taken(conn: &Connection, vault_id: &VaultId, name: &str, except: Option<&ValueId>) -> Result<bool> {
    let existing: Option<Vec<u8>> = conn
        .query_row(
            "SELECT value_id FROM secret_values WHERE vault_id = ?1 AND name = ?2",
            params![&vault_id.0[..], name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(match (existing, except) {
        (Some(id), Some(except)) => id.as_slice() != &except.0[..],
        (Some(_), None) => true,
        (None, _) => false,
    })
}

fn insert_rights(
    conn: &Connection,
    vault_id: &VaultId,
    identity_id: &IdentityId,
    grants: &[Grant],
) -> Result<Vec<Right>> {
    let mut stmt = conn.prepare(
        "INSERT INTO rights (right_id, vault_id, identity_id, direction, target, pattern)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    let mut rights = Vec::with_capacity(grants.len());
    for grant in grants {
        let right = Right {
            id: RightId::generate(),
            identity_id: *identity_id,
            grant: grant.clone(),
        };
        stmt.execute(params![
            &right.id.0[..],
            &vault_id.0[..],
            &identity_id.0[..],
            grant.direction.as_char().to_string(),
            grant.target.as_str(),
            grant.pattern,
        ])?;
        rights.push(right);
    }
    Ok(rights)
}

fn insert_identity(conn: &Connection, vault_id: &VaultId, identity: &Identity) -> Result<()> {
    let assertion = identity
        .creator_verification
        .as_ref()
        .map(|a| a.to_bytes())
        .transpose()
        .map_err(|e| DirectoryError::Serialization(e.to_string()))?;
    let key = identity.public_key.to_bytes();

    conn.execute(
        "INSERT INTO identities (
            vault_id, identity_id, name, public_key, creator_verification, operator, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &vault_id.0[..],
            &identity.id.0[..],
            identity.name,
            &key[..],
            assertion,
            identity.operator,
            identity.created_at,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn create_vault(&self, name: &str, operator_key: &IdentityPublicKey) -> Result<Vault> {
        let name = name.to_string();
        let operator_key = *operator_key;

        self.blocking(move |conn| {
            let now = now_millis();
            let vault = Vault {
                id: VaultId::generate(),
                name,
                operator_key,
                created_at: now,
                updated_at: now,
            };
            let operator = Identity {
                id: IdentityId::derive(&operator_key, &vault.id),
                name: OPERATOR_NAME.to_string(),
                public_key: operator_key,
                creator_verification: None,
                operator: true,
                created_at: now,
            };
            let key = operator_key.to_bytes();

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO vaults (vault_id, name, operator_key, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&vault.id.0[..], vault.name, &key[..], now, now],
            )?;
            insert_identity(&tx, &vault.id, &operator)?;
            insert_rights(&tx, &vault.id, &operator.id, &operator_grants())?;
            tx.commit()?;

            Ok(vault)
        })
        .await
    }

    async fn get_vault(&self, vault_id: &VaultId) -> Result<Vault> {
        let vault_id = *vault_id;
        self.blocking(move |conn| load_vault(conn, &vault_id)).await
    }

    async fn update_vault(&self, vault_id: &VaultId, name: &str) -> Result<Vault> {
        let vault_id = *vault_id;
        let name = name.to_string();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE vaults SET name = ?2, updated_at = ?3 WHERE vault_id = ?1",
                params![&vault_id.0[..], name, now_millis()],
            )?;
            if changed == 0 {
                return Err(DirectoryError::not_found("vault", vault_id));
            }
            load_vault(conn, &vault_id)
        })
        .await
    }

    async fn delete_vault(&self, vault_id: &VaultId) -> Result<()> {
        let vault_id = *vault_id;

        self.blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM vaults WHERE vault_id = ?1",
                params![&vault_id.0[..]],
            )?;
            if changed == 0 {
                return Err(DirectoryError::not_found("vault", vault_id));
            }
            Ok(())
        })
        .await
    }

    async fn add_identity(&self, vault_id: &VaultId, identity: &NewIdentity) -> Result<Identity> {
        if identity.id != IdentityId::derive(&identity.public_key, vault_id) {
            return Err(DirectoryError::InvalidData(format!(
                "identity id {} is not derived from its public key",
                identity.id
            )));
        }

        let vault_id = *vault_id;
        let stored = Identity {
            id: identity.id,
            name: identity.name.clone(),
            public_key: identity.public_key,
            creator_verification: Some(identity.creator_verification.clone()),
            operator: false,
            created_at: now_millis(),
        };

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            load_vault(&tx, &vault_id)?;
            match load_identity(&tx, &vault_id, &stored.id) {
                Ok(_) => {
                    return Err(DirectoryError::Conflict(format!(
                        "identity {} already exists",
                        stored.id
                    )))
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            insert_identity(&tx, &vault_id, &stored)?;
            tx.commit()?;
            Ok(stored)
        })
        .await
    }

    async fn update_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        name: &str,
    ) -> Result<Identity> {
        let vault_id = *vault_id;
        let identity_id = *identity_id;
        let name = name.to_string();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE identities SET name = ?3 WHERE vault_id = ?1 AND identity_id = ?2",
                params![&vault_id.0[..], &identity_id.0[..], name],
            )?;
            if changed == 0 {
                load_vault(conn, &vault_id)?;
                return Err(DirectoryError::not_found("identity", identity_id));
            }
            load_identity(conn, &vault_id, &identity_id)
        })
        .await
    }

    async fn delete_identity(&self, vault_id: &VaultId, identity_id: &IdentityId) -> Result<()> {
        let vault_id = *vault_id;
        let identity_id = *identity_id;

        self.blocking(move |conn| {
            if load_identity(conn, &vault_id, &identity_id)?.is_operator() {
                return Err(DirectoryError::Conflict(
                    "the operator identity cannot be deleted".into(),
                ));
            }
            // Rights go with the identity by cascade.
            conn.execute(
                "DELETE FROM identities WHERE vault_id = ?1 AND identity_id = ?2",
                params![&vault_id.0[..], &identity_id.0[..]],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Identity> {
        let vault_id = *vault_id;
        let identity_id = *identity_id;
        self.blocking(move |conn| load_identity(conn, &vault_id, &identity_id))
            .await
    }

    async fn list_identities(&self, vault_id: &VaultId) -> Result<Vec<Identity>> {
        let vault_id = *vault_id;

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM identities i WHERE i.vault_id = ?1 ORDER BY i.identity_id",
                IDENTITY_COLUMNS
            ))?;
            let identities = stmt
                .query_map(params![&vault_id.0[..]], row_to_identity)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(identities)
        })
        .await
    }

    async fn add_rights(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
        grants: &[Grant],
    ) -> Result<Vec<Right>> {
        let vault_id = *vault_id;
        let identity_id = *identity_id;
        let grants = grants.to_vec();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            load_identity(&tx, &vault_id, &identity_id)?;
            let rights = insert_rights(&tx, &vault_id, &identity_id, &grants)?;
            tx.commit()?;
            Ok(rights)
        })
        .await
    }

    async fn list_rights(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Vec<Right>> {
        let vault_id = *vault_id;
        let identity_id = *identity_id;

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            let mut stmt = conn.prepare(
                "SELECT right_id, identity_id, direction, target, pattern
                 FROM rights WHERE vault_id = ?1 AND identity_id = ?2 ORDER BY rowid",
            )?;
            let rights = stmt
                .query_map(params![&vault_id.0[..], &identity_id.0[..]], row_to_right)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rights)
        })
        .await
    }

    async fn delete_right(&self, vault_id: &VaultId, right_id: &RightId) -> Result<()> {
        let vault_id = *vault_id;
        let right_id = *right_id;

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            let changed = conn.execute(
                "DELETE FROM rights WHERE vault_id = ?1 AND right_id = ?2",
                params![&vault_id.0[..], &right_id.0[..]],
            )?;
            if changed == 0 {
                return Err(DirectoryError::not_found("right", right_id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_all_rights_for_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<()> {
        let vault_id = *vault_id;
        let identity_id = *identity_id;

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            conn.execute(
                "DELETE FROM rights WHERE vault_id = ?1 AND identity_id = ?2",
                params![&vault_id.0[..], &identity_id.0[..]],
            )?;
            Ok(())
        })
        .await
    }

    async fn create_value(
        &self,
        vault_id: &VaultId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value> {
        let vault_id = *vault_id;
        let name = name.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            load_vault(&tx, &vault_id)?;
            if name_taken(&tx, &vault_id, &name, None)? {
                return Err(DirectoryError::Conflict(format!(
                    "value name {} is taken",
                    name
                )));
            }

            let now = now_millis();
            let value = Value {
                id: ValueId::generate(),
                name,
                value_type,
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                "INSERT INTO secret_values (value_id, vault_id, name, value_type, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    &value.id.0[..],
                    &vault_id.0[..],
                    value.name,
                    value.value_type.as_str(),
                    now,
                    now,
                ],
            )?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }

    async fn update_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        name: &str,
        value_type: ValueType,
    ) -> Result<Value> {
        let vault_id = *vault_id;
        let value_id = *value_id;
        let name = name.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            load_value(&tx, &vault_id, &value_id)?;
            if name_taken(&tx, &vault_id, &name, Some(&value_id))? {
                return Err(DirectoryError::Conflict(format!(
                    "value name {} is taken",
                    name
                )));
            }
            tx.execute(
                "UPDATE secret_values SET name = ?2, value_type = ?3, updated_at = ?4
                 WHERE value_id = ?1",
                params![&value_id.0[..], name, value_type.as_str(), now_millis()],
            )?;
            let value = load_value(&tx, &vault_id, &value_id)?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }

    async fn delete_value(&self, vault_id: &VaultId, value_id: &ValueId) -> Result<()> {
        let vault_id = *vault_id;
        let value_id = *value_id;

        self.blocking(move |conn| {
            load_value(conn, &vault_id, &value_id)?;
            // Copies go with the value by cascade.
            conn.execute(
                "DELETE FROM secret_values WHERE value_id = ?1",
                params![&value_id.0[..]],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_value_by_id(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
    ) -> Result<ValueRecord> {
        let vault_id = *vault_id;
        let value_id = *value_id;

        self.blocking(move |conn| {
            let value = load_value(conn, &vault_id, &value_id)?;
            load_record(conn, value)
        })
        .await
    }

    async fn get_value_by_name(&self, vault_id: &VaultId, name: &str) -> Result<ValueRecord> {
        let vault_id = *vault_id;
        let name = name.to_string();

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            let value = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM secret_values v WHERE v.vault_id = ?1 AND v.name = ?2",
                        VALUE_COLUMNS
                    ),
                    params![&vault_id.0[..], name],
                    row_to_value,
                )
                .optional()?
                .ok_or_else(|| DirectoryError::not_found("value", &name))?;
            load_record(conn, value)
        })
        .await
    }

    async fn add_identity_values(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        copies: &[EncryptedCopy],
    ) -> Result<Vec<IdentityValue>> {
        let vault_id = *vault_id;
        let value_id = *value_id;
        let copies = copies.to_vec();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            load_value(&tx, &vault_id, &value_id)?;

            let mut stored = Vec::with_capacity(copies.len());
            for copy in &copies {
                load_identity(&tx, &vault_id, &copy.identity_id)?;

                let held: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM identity_values
                                   WHERE value_id = ?1 AND identity_id = ?2)",
                    params![&value_id.0[..], &copy.identity_id.0[..]],
                    |row| row.get(0),
                )?;
                if held {
                    // Dropping the transaction rolls back earlier rows.
                    return Err(DirectoryError::Conflict(format!(
                        "identity {} already holds a copy of value {}",
                        copy.identity_id, value_id
                    )));
                }

                let row = IdentityValue {
                    id: IdentityValueId::generate(),
                    value_id,
                    identity_id: copy.identity_id,
                    passframe: copy.passframe.clone(),
                };
                tx.execute(
                    "INSERT INTO identity_values (identity_value_id, value_id, identity_id, passframe)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        &row.id.0[..],
                        &value_id.0[..],
                        &row.identity_id.0[..],
                        row.passframe.as_bytes(),
                    ],
                )?;
                stored.push(row);
            }

            tx.commit()?;
            Ok(stored)
        })
        .await
    }

    async fn update_identity_value(
        &self,
        vault_id: &VaultId,
        value_id: &ValueId,
        identity_id: &IdentityId,
        passframe: &Passframe,
    ) -> Result<IdentityValue> {
        let vault_id = *vault_id;
        let value_id = *value_id;
        let identity_id = *identity_id;
        let passframe = passframe.clone();

        self.blocking(move |conn| {
            load_value(conn, &vault_id, &value_id)?;
            let changed = conn.execute(
                "UPDATE identity_values SET passframe = ?3 WHERE value_id = ?1 AND identity_id = ?2",
                params![&value_id.0[..], &identity_id.0[..], passframe.as_bytes()],
            )?;
            if changed == 0 {
                return Err(DirectoryError::not_found("identity value", identity_id));
            }
            conn.query_row(
                "SELECT identity_value_id, value_id, identity_id, passframe
                 FROM identity_values WHERE value_id = ?1 AND identity_id = ?2",
                params![&value_id.0[..], &identity_id.0[..]],
                row_to_copy,
            )
            .map_err(DirectoryError::from)
        })
        .await
    }

    async fn delete_identity_value(
        &self,
        vault_id: &VaultId,
        id: &IdentityValueId,
    ) -> Result<()> {
        let vault_id = *vault_id;
        let id = *id;

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            let changed = conn.execute(
                "DELETE FROM identity_values
                 WHERE identity_value_id = ?1
                   AND value_id IN (SELECT value_id FROM secret_values WHERE vault_id = ?2)",
                params![&id.0[..], &vault_id.0[..]],
            )?;
            if changed == 0 {
                return Err(DirectoryError::not_found("identity value", id));
            }
            Ok(())
        })
        .await
    }

    async fn list_identities_with_read_access(
        &self,
        vault_id: &VaultId,
        name: &str,
    ) -> Result<Vec<Identity>> {
        let vault_id = *vault_id;
        let name = name.to_string();

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, r.pattern FROM identities i
                 JOIN rights r ON r.vault_id = i.vault_id AND r.identity_id = i.identity_id
                 WHERE i.vault_id = ?1 AND r.target = ?2 AND r.direction = ?3
                 ORDER BY i.identity_id",
                IDENTITY_COLUMNS
            ))?;
            let candidates = stmt
                .query_map(
                    params![
                        &vault_id.0[..],
                        RightTarget::Values.as_str(),
                        Direction::Read.as_char().to_string(),
                    ],
                    |row| Ok((row_to_identity(row)?, row.get::<_, String>("pattern")?)),
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut entitled: Vec<Identity> = candidates
                .into_iter()
                .filter(|(_, pattern)| subject_matches(pattern, &name))
                .map(|(identity, _)| identity)
                .collect();
            entitled.dedup_by_key(|identity| identity.id);
            Ok(entitled)
        })
        .await
    }

    async fn list_values_related_to_identity(
        &self,
        vault_id: &VaultId,
        identity_id: &IdentityId,
    ) -> Result<Vec<Value>> {
        let vault_id = *vault_id;
        let identity_id = *identity_id;

        self.blocking(move |conn| {
            load_vault(conn, &vault_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM secret_values v
                 JOIN identity_values c ON c.value_id = v.value_id
                 WHERE v.vault_id = ?1 AND c.identity_id = ?2
                 ORDER BY v.name",
                VALUE_COLUMNS
            ))?;
            let values = stmt
                .query_map(params![&vault_id.0[..], &identity_id.0[..]], row_to_value)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(values)
        })
        .await
    }
}
