//! Trust chain verification.
//!
//! Every non-operator identity carries a [`CreatorAssertion`] signed by the
//! identity that admitted it. Following creators back from any identity must
//! reach an operator, with each link's signature checking out against the
//! creator's public key. An identity whose lineage cannot be established is
//! not trusted, and no secret is encrypted to it.
//!
//! Walks are iterative with a visited set, so a cyclic chain is reported as
//! [`ChainError::CyclicChain`] instead of looping.

use std::collections::HashSet;

use passvault_core::{CryptoProvider, Identity, IdentityId};

use crate::error::ChainError;

/// Verifies creator lineages against a set of peer identities.
pub struct ChainVerifier<'a, C: ?Sized> {
    crypto: &'a C,
}

impl<'a, C: CryptoProvider + ?Sized> ChainVerifier<'a, C> {
    pub fn new(crypto: &'a C) -> Self {
        Self { crypto }
    }

    /// Verify one identity's chain back to an operator.
    ///
    /// `peers` is the universe creators are looked up in. The identity itself
    /// need not be among them.
    pub fn verify_chain(&self, identity: &Identity, peers: &[Identity]) -> Result<(), ChainError> {
        self.walk(identity, peers, &mut HashSet::new())
    }

    /// Verify every identity in `identities`, each against the whole set.
    ///
    /// Identities already proven while walking an earlier chain are not
    /// re-verified. Fails on the first identity (in the given order) whose
    /// chain is broken.
    pub fn verify_all(&self, identities: &[Identity]) -> Result<(), ChainError> {
        let mut trusted = HashSet::new();
        for identity in identities {
            self.walk(identity, identities, &mut trusted)?;
        }
        Ok(())
    }

    fn walk<'p>(
        &self,
        start: &'p Identity,
        peers: &'p [Identity],
        trusted: &mut HashSet<IdentityId>,
    ) -> Result<(), ChainError> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        let mut current = start;

        loop {
            if trusted.contains(&current.id) {
                break;
            }
            if !visited.insert(current.id) {
                return Err(ChainError::CyclicChain {
                    identity: current.id,
                });
            }
            path.push(current.id);

            if current.is_operator() {
                break;
            }
            current = self.verify_link(current, peers)?;
        }

        trusted.extend(path);
        Ok(())
    }

    /// Check one assertion and return the creator it names.
    fn verify_link<'p>(
        &self,
        identity: &Identity,
        peers: &'p [Identity],
    ) -> Result<&'p Identity, ChainError> {
        let bad = |reason: String| ChainError::BadAssertion {
            identity: identity.id,
            reason,
        };

        let assertion = identity
            .creator_verification()
            .ok_or_else(|| bad("missing creator verification".into()))?;
        let claims = self
            .crypto
            .decode_creator_assertion(assertion)
            .map_err(|e| bad(e.to_string()))?;

        if claims.subject_id != identity.id {
            return Err(bad(format!(
                "assertion is about {}, not this identity",
                claims.subject_id
            )));
        }

        let mut matches = peers.iter().filter(|p| p.id == claims.creator_id);
        let creator = match (matches.next(), matches.next()) {
            (Some(creator), None) => creator,
            _ => {
                return Err(ChainError::AmbiguousOrMissingCreator {
                    identity: identity.id,
                    creator: claims.creator_id,
                    found: peers.iter().filter(|p| p.id == claims.creator_id).count(),
                })
            }
        };

        self.crypto
            .verify_creator_assertion(&creator.public_key, assertion)
            .map_err(|_| ChainError::InvalidSignature {
                identity: identity.id,
                creator: creator.id,
            })?;

        Ok(creator)
    }
}
