//! # passvault Testkit
//!
//! Testing utilities for passvault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a vault with its operator, plus helpers to admit identities
//!   and store secrets
//! - **Fault injection**: crypto and directory wrappers that fail chosen calls
//! - **Generators**: Proptest strategies for rights patterns and value names
//! - **Golden vectors**: fixed parse and match cases for the rights language
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use passvault_testkit::VaultFixture;
//!
//! async fn example() {
//!     let fixture = VaultFixture::new().await.unwrap();
//!     let (_, alice) = fixture.admit("alice", &["(r)VALUES.db.>"]).await.unwrap();
//!
//!     fixture.add_secret("VALUES.db.password", "hunter2").await.unwrap();
//!     let read = fixture.read(&alice, "VALUES.db.password").await.unwrap();
//!     assert_eq!(read.as_deref(), Some("hunter2"));
//! }
//! ```
//!
//! ## Fault Injection
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use passvault::VaultConfig;
//! use passvault_testkit::{DirectoryOp, FlakyCrypto, InstrumentedDirectory, VaultFixture};
//!
//! async fn example() {
//!     let directory = Arc::new(InstrumentedDirectory::memory());
//!     let fixture = VaultFixture::with(directory.clone(), FlakyCrypto::new(), VaultConfig::default())
//!         .await
//!         .unwrap();
//!
//!     fixture.vault.crypto().fail_nth_encrypt(1);
//!     directory.fail(DirectoryOp::DeleteValue);
//!     assert!(fixture.add_secret("VALUES.a", "x").await.is_err());
//! }
//! ```
//!
//! ## Golden Vectors
//!
//! ```rust
//! use passvault_testkit::vectors::verify_all_vectors;
//!
//! let failures = verify_all_vectors().unwrap();
//! assert!(failures.is_empty(), "{:?}", failures);
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use faults::{DirectoryOp, FlakyCrypto, InstrumentedDirectory};
pub use fixtures::{random_secret, seeded_keypairs, VaultFixture};
pub use generators::PatternParams;
pub use vectors::{all_vectors, verify_all_vectors, GoldenVectors, MatchVector, ParseVector};
