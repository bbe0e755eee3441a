//! Engine configuration.

use std::time::Duration;

/// Configuration for a [`Vault`](crate::Vault).
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Re-sync the caller's values after adding, updating or deleting an
    /// identity, so copy sets follow the rights change.
    pub sync_on_identity_change: bool,
    /// Lifetime of bearer tokens minted for the transport layer.
    pub token_ttl: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            sync_on_identity_change: true,
            token_ttl: Duration::from_secs(5 * 60),
        }
    }
}
