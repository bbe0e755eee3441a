//! # passvault
//!
//! A multi-party secret vault client. Secrets are stored as one encrypted
//! copy per entitled identity; the directory that holds them never sees
//! plaintext.
//!
//! ## Overview
//!
//! The [`Vault`] engine provides:
//!
//! - **Fan-out**: a new value is encrypted once for every identity whose
//!   rights grant read access to its name
//! - **Re-encryption**: updating a value re-encrypts every existing copy
//! - **Sync**: copy sets are reconciled with the current rights
//! - **Trust chains**: every recipient must trace back to the operator
//!   through signed creator assertions before it receives a copy
//!
//! ## Key Concepts
//!
//! - **Operator**: the identity that created the vault, the root of trust
//! - **Right**: `(rwd)TARGET.segment.segment` with `*` and `>` wildcards
//! - **Copy**: one identity's ciphertext of one value's secret
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use passvault::{Vault, VaultConfig};
//! use passvault::core::{Secret, StandardCrypto, ValueType};
//! use passvault::directory::SqliteDirectory;
//!
//! async fn example() {
//!     let directory = Arc::new(SqliteDirectory::open("vault.db").unwrap());
//!
//!     let (vault, operator) =
//!         Vault::create(directory, StandardCrypto::new(), "team", VaultConfig::default())
//!             .await
//!             .unwrap();
//!
//!     let (_, alice) = vault
//!         .create_identity(&operator, "alice", &["(r)VALUES.db.>"])
//!         .await
//!         .unwrap();
//!
//!     vault
//!         .add_value(&operator, "VALUES.db.password", &Secret::new("hunter2"), ValueType::String)
//!         .await
//!         .unwrap();
//!
//!     let read = vault.get_value_by_name(&alice, "VALUES.db.password").await.unwrap();
//!     assert_eq!(read.secret.as_str(), Some("hunter2"));
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `passvault::core` - ids, keys, sealed copies, assertions
//! - `passvault::perms` - rights parsing and trust-chain verification
//! - `passvault::directory` - the directory trait, SQLite and in-memory

pub mod config;
pub mod error;
pub mod vault;
pub mod values;

pub use passvault_core as core;
pub use passvault_directory as directory;
pub use passvault_perms as perms;

pub use config::VaultConfig;
pub use error::{AggregateError, Result, VaultError};
pub use vault::{AddedIdentity, Vault};
pub use values::{DecryptedValue, SyncReport, UpdateReport};

pub use passvault_core::{
    CryptoProvider, IdentityId, IdentityKeypair, IdentityPublicKey, Secret, StandardCrypto,
    ValueId, ValueType, VaultId,
};
