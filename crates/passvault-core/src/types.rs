//! The vault data model.
//!
//! These are the records the directory stores. The client never caches them
//! across operations; they are fetched, used, and dropped within one call.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::assertion::CreatorAssertion;
use crate::ids::{IdentityId, IdentityValueId, RightId, ValueId, VaultId};
use crate::keys::IdentityPublicKey;
use crate::sealed::Passframe;

/// Root scope: owns identities, rights and values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub name: String,
    /// Public key of the root operator identity.
    pub operator_key: IdentityPublicKey,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An asymmetric key holder recognized within a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Always `IdentityId::derive(public_key, vault)`.
    pub id: IdentityId,
    pub name: String,
    pub public_key: IdentityPublicKey,
    /// Signed by the admitting identity. Absent iff this is the operator.
    pub creator_verification: Option<CreatorAssertion>,
    pub operator: bool,
    pub created_at: i64,
}

impl Identity {
    /// Whether this identity is the vault's root of trust.
    pub fn is_operator(&self) -> bool {
        self.operator
    }

    /// The assertion that admitted this identity, if any.
    pub fn creator_verification(&self) -> Option<&CreatorAssertion> {
        self.creator_verification.as_ref()
    }
}

/// What a client submits to admit a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIdentity {
    pub id: IdentityId,
    pub name: String,
    pub public_key: IdentityPublicKey,
    pub creator_verification: CreatorAssertion,
}

/// Access direction of a right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Read,
    Write,
    Delete,
}

impl Direction {
    /// The single-letter form used in rights patterns.
    pub fn as_char(&self) -> char {
        match self {
            Direction::Read => 'r',
            Direction::Write => 'w',
            Direction::Delete => 'd',
        }
    }

    /// Parse the single-letter form.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'r' => Some(Direction::Read),
            'w' => Some(Direction::Write),
            'd' => Some(Direction::Delete),
            _ => None,
        }
    }
}

/// Category a right applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RightTarget {
    Values,
    Identity,
    System,
}

impl RightTarget {
    /// The keyword used in rights patterns.
    pub fn as_str(&self) -> &'static str {
        match self {
            RightTarget::Values => "VALUES",
            RightTarget::Identity => "IDENTITY",
            RightTarget::System => "SYSTEM",
        }
    }

    /// Parse the keyword form. Case-sensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VALUES" => Some(RightTarget::Values),
            "IDENTITY" => Some(RightTarget::Identity),
            "SYSTEM" => Some(RightTarget::System),
            _ => None,
        }
    }
}

impl fmt::Display for RightTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (direction, target, pattern) grant.
///
/// `pattern` always starts with the target keyword, e.g. `VALUES.db.>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub direction: Direction,
    pub target: RightTarget,
    pub pattern: String,
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.direction.as_char(), self.pattern)
    }
}

/// A stored grant attached to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Right {
    pub id: RightId,
    pub identity_id: IdentityId,
    pub grant: Grant,
}

/// Declared type of a value's secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Json,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ValueType::String),
            "json" => Some(ValueType::Json),
            _ => None,
        }
    }
}

/// A named secret's metadata. The secret itself only exists as copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub id: ValueId,
    /// Concrete dot-segmented name, e.g. `VALUES.db.password`.
    pub name: String,
    pub value_type: ValueType,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A ciphertext together with the identity that can open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedCopy {
    pub identity_id: IdentityId,
    pub passframe: Passframe,
}

/// One stored copy of a value's secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityValue {
    pub id: IdentityValueId,
    pub value_id: ValueId,
    pub identity_id: IdentityId,
    pub passframe: Passframe,
}

impl IdentityValue {
    /// View as an encrypted copy.
    pub fn to_copy(&self) -> EncryptedCopy {
        EncryptedCopy {
            identity_id: self.identity_id,
            passframe: self.passframe.clone(),
        }
    }
}

/// A value together with all of its current copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub value: Value,
    pub copies: Vec<IdentityValue>,
}

impl ValueRecord {
    /// The copy held by an identity, if any.
    pub fn copy_for(&self, identity_id: &IdentityId) -> Option<&IdentityValue> {
        self.copies.iter().find(|c| &c.identity_id == identity_id)
    }

    /// Whether an identity holds a copy.
    pub fn is_held_by(&self, identity_id: &IdentityId) -> bool {
        self.copy_for(identity_id).is_some()
    }
}

/// Plaintext secret bytes. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Interpret as UTF-8, if it is.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<{} bytes redacted>)", self.0.len())
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<Vec<u8>> for Secret {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
