//! Database schema migrations for SQLite.
//!
//! Each migration is a SQL batch that moves the schema from version N to N+1.
//! Applied versions are recorded in `schema_migrations`.

use passvault_core::now_millis;
use rusqlite::Connection;

use crate::error::{DirectoryError, Result};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(DirectoryError::Migration(format!(
            "database is at version {}, newer than supported {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            tracing::debug!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(DirectoryError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: vaults, identities, rights, values and copies.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE vaults (
            vault_id BLOB PRIMARY KEY,        -- 16 bytes
            name TEXT NOT NULL,
            operator_key BLOB NOT NULL,       -- 64 bytes, signing || encryption
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE identities (
            vault_id BLOB NOT NULL REFERENCES vaults(vault_id) ON DELETE CASCADE,
            identity_id BLOB NOT NULL,        -- 32 bytes, derived from key + vault
            name TEXT NOT NULL,
            public_key BLOB NOT NULL,         -- 64 bytes
            creator_verification BLOB,        -- CBOR CreatorAssertion, NULL for the operator
            operator INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (vault_id, identity_id)
        );

        CREATE TABLE rights (
            right_id BLOB PRIMARY KEY,        -- 16 bytes
            vault_id BLOB NOT NULL,
            identity_id BLOB NOT NULL,
            direction TEXT NOT NULL,          -- r | w | d
            target TEXT NOT NULL,             -- VALUES | IDENTITY | SYSTEM
            pattern TEXT NOT NULL,
            FOREIGN KEY (vault_id, identity_id)
                REFERENCES identities(vault_id, identity_id) ON DELETE CASCADE
        );

        CREATE TABLE secret_values (
            value_id BLOB PRIMARY KEY,        -- 16 bytes
            vault_id BLOB NOT NULL REFERENCES vaults(vault_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            value_type TEXT NOT NULL,         -- string | json
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (vault_id, name)
        );

        -- No foreign key to identities: a deleted identity's copies stay
        -- until the next sync removes them.
        CREATE TABLE identity_values (
            identity_value_id BLOB PRIMARY KEY,
            value_id BLOB NOT NULL REFERENCES secret_values(value_id) ON DELETE CASCADE,
            identity_id BLOB NOT NULL,
            passframe BLOB NOT NULL,
            UNIQUE (value_id, identity_id)
        );

        CREATE INDEX idx_rights_identity ON rights(vault_id, identity_id);
        CREATE INDEX idx_rights_read_values ON rights(vault_id, target, direction);
        CREATE INDEX idx_identity_values_holder ON identity_values(identity_id);
        "#,
    )?;

    Ok(())
}
