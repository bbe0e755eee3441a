//! # passvault Permissions
//!
//! Rights and trust for passvault:
//!
//! - [`rights`] - the `(rwd)TARGET.segment` pattern language
//! - [`chain`] - creator trust-chain verification back to an operator
//!
//! Both are pure: patterns are parsed locally, and chains are verified over
//! identity records the caller has already fetched.

pub mod chain;
pub mod error;
pub mod rights;

pub use chain::ChainVerifier;
pub use error::{ChainError, PatternError, Result};
pub use rights::{parse_all, parse_rights, validate_value_name, MAX_DIRECTIONS};
