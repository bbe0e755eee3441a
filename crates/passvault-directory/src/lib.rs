//! # passvault Directory
//!
//! The system of record for vaults, identities, rights, values and their
//! per-identity encrypted copies, behind the [`Directory`] trait.
//!
//! ## Key Types
//!
//! - [`Directory`] - the async trait the vault engine talks to
//! - [`SqliteDirectory`] - SQLite-based persistent directory
//! - [`MemoryDirectory`] - in-memory directory for tests
//! - [`subject_matches`] - how rights patterns resolve against value names
//!
//! ## Usage
//!
//! ```rust,no_run
//! use passvault_core::IdentityKeypair;
//! use passvault_directory::{Directory, SqliteDirectory};
//!
//! async fn example() {
//!     let directory = SqliteDirectory::open("vault.db").unwrap();
//!
//!     let operator = IdentityKeypair::generate();
//!     let vault = directory
//!         .create_vault("team", &operator.public_key())
//!         .await
//!         .unwrap();
//!
//!     let entitled = directory
//!         .list_identities_with_read_access(&vault.id, "VALUES.db.password")
//!         .await
//!         .unwrap();
//!     assert_eq!(entitled.len(), 1);
//! }
//! ```

pub mod error;
pub mod matching;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod conformance;

pub use error::{DirectoryError, Result};
pub use matching::{grants_value_read, subject_matches};
pub use memory::MemoryDirectory;
pub use sqlite::SqliteDirectory;
pub use traits::{operator_grants, Directory, OPERATOR_NAME};
