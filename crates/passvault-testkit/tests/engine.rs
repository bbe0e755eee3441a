//! End-to-end behaviour of the vault engine against an instrumented
//! in-memory directory.

use std::sync::Arc;
use std::time::Duration;

use passvault::core::{
    now_millis, CoreError, CreatorAssertion, CreatorClaims, CryptoProvider, IdentityKeypair,
    NewIdentity, Secret, ValueType,
};
use passvault::directory::{Directory, DirectoryError};
use passvault::perms::ChainError;
use passvault::{VaultConfig, VaultError};
use passvault_testkit::{DirectoryOp, FlakyCrypto, InstrumentedDirectory, VaultFixture};

type Fixture = VaultFixture<InstrumentedDirectory, FlakyCrypto>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn fixture(sync_on_identity_change: bool) -> anyhow::Result<(Fixture, Arc<InstrumentedDirectory>)> {
    init_tracing();
    let directory = Arc::new(InstrumentedDirectory::memory());
    let config = VaultConfig {
        sync_on_identity_change,
        ..VaultConfig::default()
    };
    let fixture = VaultFixture::with(directory.clone(), FlakyCrypto::new(), config).await?;
    Ok((fixture, directory))
}

// ─────────────────────────────────────────────────────────────────────────────
// add_value
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_encryption_leaves_no_value() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    fixture.admit("alice", &["(r)VALUES.db.>"]).await?;
    fixture.admit("bob", &["(r)VALUES.>"]).await?;

    for k in 1..=3 {
        fixture.vault.crypto().fail_nth_encrypt(k);
        let err = fixture
            .add_secret("VALUES.db.password", "hunter2")
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Encryption { .. }), "k={k}: {err}");

        let lookup = fixture
            .vault
            .get_value_by_name(&fixture.operator, "VALUES.db.password")
            .await;
        assert!(lookup.unwrap_err().is_not_found(), "k={k}");
        assert!(fixture
            .vault
            .related_values(&fixture.operator_id())
            .await?
            .is_empty());
    }

    // Nothing was left behind, so the name is free again.
    fixture.vault.crypto().heal();
    let id = fixture.add_secret("VALUES.db.password", "hunter2").await?;
    assert_eq!(fixture.holders(&id).await?.len(), 3);
    assert!(directory.writes() > 0);
    Ok(())
}

#[tokio::test]
async fn failed_copy_batch_rolls_back() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    directory.fail(DirectoryOp::AddIdentityValues);

    let err = fixture.add_secret("VALUES.a", "x").await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::Directory(DirectoryError::Unavailable(_))
    ));
    assert!(directory
        .get_value_by_name(&fixture.vault.id(), "VALUES.a")
        .await
        .unwrap_err()
        .is_not_found());
    Ok(())
}

#[tokio::test]
async fn failed_rollback_is_reported_with_cause() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    fixture.vault.crypto().fail_nth_encrypt(1);
    directory.fail(DirectoryOp::DeleteValue);

    let err = fixture.add_secret("VALUES.a", "x").await.unwrap_err();
    match &err {
        VaultError::RollbackFailed { original, rollback } => {
            assert!(matches!(**original, VaultError::Encryption { .. }));
            assert!(matches!(
                **rollback,
                VaultError::Directory(DirectoryError::Unavailable(_))
            ));
        }
        other => panic!("expected RollbackFailed, got {other}"),
    }
    assert!(err.to_string().contains("rollback failed"));

    // The half-created value is still there, with no copies.
    let record = directory
        .get_value_by_name(&fixture.vault.id(), "VALUES.a")
        .await?;
    assert!(record.copies.is_empty());
    Ok(())
}

#[tokio::test]
async fn unentitled_caller_cannot_create() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    let (_, alice) = fixture.admit("alice", &["(rw)VALUES.web.*"]).await?;
    directory.reset_writes();

    let err = fixture
        .vault
        .add_value(&alice, "VALUES.db.password", &Secret::new("x"), ValueType::String)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Unauthorized(_)));
    assert_eq!(directory.writes(), 0);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// update_value
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_collects_every_failed_recipient() -> anyhow::Result<()> {
    let (fixture, _) = fixture(true).await?;
    let (alice, alice_keys) = fixture.admit("alice", &["(r)VALUES.>"]).await?;
    let (bob, _) = fixture.admit("bob", &["(r)VALUES.>"]).await?;
    let id = fixture.add_secret("VALUES.db.password", "old").await?;

    fixture.vault.crypto().refuse_recipient(alice.public_key);
    fixture.vault.crypto().refuse_recipient(bob.public_key);

    let err = fixture
        .vault
        .update_value(
            &fixture.operator,
            &id,
            "VALUES.db.password",
            &Secret::new("new"),
            ValueType::Json,
        )
        .await
        .unwrap_err();

    let VaultError::Aggregate(aggregate) = err else {
        panic!("expected Aggregate");
    };
    assert_eq!(aggregate.len(), 2);
    let mut failed: Vec<_> = aggregate
        .causes
        .iter()
        .map(|cause| match cause {
            VaultError::Encryption { identity, .. } => *identity,
            other => panic!("unexpected cause {other}"),
        })
        .collect();
    failed.sort();
    let mut expected = vec![alice.id, bob.id];
    expected.sort();
    assert_eq!(failed, expected);

    // Best effort: metadata and the operator's copy moved on, the others did not.
    let own = fixture.vault.get_value(&fixture.operator, &id).await?;
    assert_eq!(own.secret.as_str(), Some("new"));
    assert_eq!(own.value.value_type, ValueType::Json);
    let theirs = fixture.vault.get_value(&alice_keys, &id).await?;
    assert_eq!(theirs.secret.as_str(), Some("old"));
    Ok(())
}

#[tokio::test]
async fn update_reports_persistence_failures() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    fixture.admit("alice", &["(r)VALUES.>"]).await?;
    let id = fixture.add_secret("VALUES.a", "old").await?;
    directory.fail(DirectoryOp::UpdateIdentityValue);

    let err = fixture
        .vault
        .update_value(&fixture.operator, &id, "VALUES.a", &Secret::new("new"), ValueType::String)
        .await
        .unwrap_err();

    let VaultError::Aggregate(aggregate) = err else {
        panic!("expected Aggregate");
    };
    assert_eq!(aggregate.len(), 2);
    assert!(aggregate
        .causes
        .iter()
        .all(|cause| matches!(cause, VaultError::Persistence { .. })));
    Ok(())
}

#[tokio::test]
async fn update_requires_a_copy() -> anyhow::Result<()> {
    let (fixture, _) = fixture(true).await?;
    let (_, carol) = fixture.admit("carol", &["(rw)VALUES.other.>"]).await?;
    let id = fixture.add_secret("VALUES.a", "x").await?;

    let err = fixture
        .vault
        .update_value(&carol, &id, "VALUES.a", &Secret::new("y"), ValueType::String)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Unauthorized(_)));
    Ok(())
}

#[tokio::test]
async fn update_drops_copies_of_deleted_identities() -> anyhow::Result<()> {
    let (fixture, _) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.a", "s1").await?;

    let alice = IdentityKeypair::generate();
    let added = fixture
        .vault
        .add_identity(&fixture.operator, "alice", &alice.public_key(), &["(r)VALUES.>"])
        .await?;
    let alice_id = added.identity.id;
    fixture.vault.sync_value(&fixture.operator, &id).await?;
    fixture
        .vault
        .delete_identity(&fixture.operator, &alice_id)
        .await?;
    assert!(fixture.holders(&id).await?.contains(&alice_id));

    let report = fixture
        .vault
        .update_value(&fixture.operator, &id, "VALUES.a", &Secret::new("s2"), ValueType::String)
        .await?;
    assert_eq!(report.removed, vec![alice_id]);
    assert_eq!(report.reencrypted, vec![fixture.operator_id()]);
    assert_eq!(fixture.holders(&id).await?, vec![fixture.operator_id()]);

    // The same key comes back with the same id and gets the current secret.
    let readmitted = fixture
        .vault
        .add_identity(&fixture.operator, "alice", &alice.public_key(), &["(r)VALUES.>"])
        .await?;
    assert_eq!(readmitted.identity.id, alice_id);
    let sync = fixture.vault.sync_value(&fixture.operator, &id).await?;
    assert_eq!(sync.added, vec![alice_id]);
    assert_eq!(fixture.read(&alice, "VALUES.a").await?.as_deref(), Some("s2"));
    assert_eq!(
        fixture.read(&fixture.operator, "VALUES.a").await?.as_deref(),
        Some("s2")
    );

    let again = fixture
        .vault
        .update_value(&fixture.operator, &id, "VALUES.a", &Secret::new("s3"), ValueType::String)
        .await?;
    assert!(again.removed.is_empty());
    assert_eq!(fixture.read(&alice, "VALUES.a").await?.as_deref(), Some("s3"));
    Ok(())
}

#[tokio::test]
async fn update_keeps_stale_copy_when_its_removal_fails() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(false).await?;
    let (alice, _) = fixture.admit("alice", &["(r)VALUES.>"]).await?;
    let id = fixture.add_secret("VALUES.a", "old").await?;
    fixture
        .vault
        .delete_identity(&fixture.operator, &alice.id)
        .await?;
    directory.fail(DirectoryOp::DeleteIdentityValue);

    let err = fixture
        .vault
        .update_value(&fixture.operator, &id, "VALUES.a", &Secret::new("new"), ValueType::String)
        .await
        .unwrap_err();
    let VaultError::Aggregate(aggregate) = err else {
        panic!("expected Aggregate");
    };
    assert_eq!(aggregate.len(), 1);
    assert!(matches!(
        &aggregate.causes[0],
        VaultError::Persistence { identity, .. } if *identity == alice.id
    ));
    assert_eq!(fixture.read(&fixture.operator, "VALUES.a").await?.as_deref(), Some("new"));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// delete_value
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_value_requires_a_copy() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    let (_, carol) = fixture.admit("carol", &["(rwd)VALUES.other.>"]).await?;
    let (_, alice) = fixture.admit("alice", &["(r)VALUES.>"]).await?;
    let id = fixture.add_secret("VALUES.a", "x").await?;
    directory.reset_writes();

    for caller in [&carol, &IdentityKeypair::generate()] {
        assert!(matches!(
            fixture.vault.delete_value(caller, &id).await,
            Err(VaultError::Unauthorized(_))
        ));
    }
    assert_eq!(directory.writes(), 0);
    assert_eq!(fixture.read(&fixture.operator, "VALUES.a").await?.as_deref(), Some("x"));

    fixture.vault.delete_value(&alice, &id).await?;
    assert!(fixture
        .vault
        .get_value(&fixture.operator, &id)
        .await
        .unwrap_err()
        .is_not_found());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// sync
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_is_idempotent() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.db.password", "s").await?;
    let (alice, alice_keys) = fixture.admit("alice", &["(r)VALUES.db.*"]).await?;

    directory.reset_writes();
    let first = fixture.vault.sync_value(&fixture.operator, &id).await?;
    assert_eq!(first.added, vec![alice.id]);
    assert!(first.removed.is_empty());
    assert_eq!(directory.writes(), 1);

    directory.reset_writes();
    let second = fixture.vault.sync_value(&fixture.operator, &id).await?;
    assert!(second.is_noop());
    assert_eq!(directory.writes(), 0);

    assert_eq!(
        fixture.read(&alice_keys, "VALUES.db.password").await?.as_deref(),
        Some("s")
    );
    Ok(())
}

#[tokio::test]
async fn sync_after_delete_identity_removes_its_copy() -> anyhow::Result<()> {
    let (fixture, _) = fixture(false).await?;
    let (alice, _) = fixture.admit("alice", &["(r)VALUES.>"]).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;
    assert!(fixture.holders(&id).await?.contains(&alice.id));

    fixture
        .vault
        .delete_identity(&fixture.operator, &alice.id)
        .await?;
    // Deleting the identity alone leaves its copy.
    assert!(fixture.holders(&id).await?.contains(&alice.id));

    let report = fixture.vault.sync_value(&fixture.operator, &id).await?;
    assert_eq!(report.removed, vec![alice.id]);
    assert!(report.added.is_empty());
    assert_eq!(fixture.holders(&id).await?, vec![fixture.operator_id()]);

    assert!(fixture
        .vault
        .sync_value(&fixture.operator, &id)
        .await?
        .is_noop());
    Ok(())
}

#[tokio::test]
async fn rights_changes_resync_automatically() -> anyhow::Result<()> {
    let (fixture, _) = fixture(true).await?;
    let id = fixture.add_secret("VALUES.db.password", "s").await?;

    let (alice, alice_keys) = fixture.admit("alice", &["(r)VALUES.db.>"]).await?;
    assert!(fixture.holders(&id).await?.contains(&alice.id));

    fixture
        .vault
        .update_identity(&fixture.operator, &alice.id, "alice", &["(r)VALUES.web.>"])
        .await?;
    assert!(!fixture.holders(&id).await?.contains(&alice.id));
    assert!(matches!(
        fixture.vault.get_value(&alice_keys, &id).await,
        Err(VaultError::Unauthorized(_))
    ));
    Ok(())
}

#[tokio::test]
async fn sync_values_covers_everything_the_caller_holds() -> anyhow::Result<()> {
    let (fixture, _) = fixture(false).await?;
    let a = fixture.add_secret("VALUES.a", "1").await?;
    let b = fixture.add_secret("VALUES.b", "2").await?;
    let (alice, _) = fixture.admit("alice", &["(r)VALUES.>"]).await?;

    let reports = fixture
        .vault
        .sync_values(&fixture.operator, &fixture.operator_id())
        .await?;
    let synced: Vec<_> = reports.iter().map(|(id, _)| *id).collect();
    assert_eq!(synced, vec![a, b]);
    assert!(reports.iter().all(|(_, r)| r.added == vec![alice.id]));
    Ok(())
}

#[tokio::test]
async fn sync_requires_entitled_caller() -> anyhow::Result<()> {
    let (fixture, _) = fixture(false).await?;
    let (_, bob) = fixture.admit("bob", &["(r)VALUES.other"]).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;

    assert!(matches!(
        fixture.vault.sync_value(&bob, &id).await,
        Err(VaultError::Unauthorized(_))
    ));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Trust chains
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn operator_alone_always_syncs() -> anyhow::Result<()> {
    let (fixture, _) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;
    assert!(fixture
        .vault
        .sync_value(&fixture.operator, &id)
        .await?
        .is_noop());
    Ok(())
}

#[tokio::test]
async fn two_hop_chain_syncs() -> anyhow::Result<()> {
    let (fixture, _) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;
    let (alice, alice_keys) = fixture.admit("alice", &["(r)VALUES.>", "(w)IDENTITY.>"]).await?;
    let (bob, bob_keys) = fixture.admit_by(&alice_keys, "bob", &["(r)VALUES.a"]).await?;

    let report = fixture.vault.sync_value(&fixture.operator, &id).await?;
    let mut added = report.added.clone();
    added.sort();
    let mut expected = vec![alice.id, bob.id];
    expected.sort();
    assert_eq!(added, expected);
    assert_eq!(fixture.read(&bob_keys, "VALUES.a").await?.as_deref(), Some("s"));
    Ok(())
}

#[tokio::test]
async fn missing_creator_blocks_sync() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;
    let (alice, alice_keys) = fixture.admit("alice", &["(r)VALUES.>", "(w)IDENTITY.>"]).await?;
    let (bob, _) = fixture.admit_by(&alice_keys, "bob", &["(r)VALUES.>"]).await?;
    fixture
        .vault
        .delete_identity(&fixture.operator, &alice.id)
        .await?;

    directory.reset_writes();
    let err = fixture
        .vault
        .sync_value(&fixture.operator, &id)
        .await
        .unwrap_err();
    match err {
        VaultError::Chain(ChainError::AmbiguousOrMissingCreator { identity, found, .. }) => {
            assert_eq!(identity, bob.id);
            assert_eq!(found, 0);
        }
        other => panic!("expected AmbiguousOrMissingCreator, got {other}"),
    }
    assert_eq!(directory.writes(), 0);
    Ok(())
}

#[tokio::test]
async fn creator_without_read_access_is_not_a_peer() -> anyhow::Result<()> {
    let (fixture, _) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;
    let (_, admin) = fixture.admit("admin", &["(rwd)IDENTITY.>"]).await?;
    fixture.admit_by(&admin, "bob", &["(r)VALUES.a"]).await?;

    assert!(matches!(
        fixture.vault.sync_value(&fixture.operator, &id).await,
        Err(VaultError::Chain(ChainError::AmbiguousOrMissingCreator { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn forged_assertion_blocks_sync() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;
    let vault_id = fixture.vault.id();
    let crypto = fixture.vault.crypto();

    // Claims the operator as creator but is signed by the newcomer itself.
    let mallory = IdentityKeypair::generate();
    let mallory_id = crypto.derive_identity_id(&mallory.public_key(), &vault_id);
    let forged = CreatorAssertion::sign(
        &mallory,
        &CreatorClaims {
            creator_id: fixture.operator_id(),
            subject_id: mallory_id,
            vault_id,
            issued_at: now_millis(),
        },
    )?;
    directory
        .add_identity(
            &vault_id,
            &NewIdentity {
                id: mallory_id,
                name: "mallory".into(),
                public_key: mallory.public_key(),
                creator_verification: forged,
            },
        )
        .await?;
    fixture.vault.add_rights(&mallory_id, &["(r)VALUES.>"]).await?;

    let err = fixture
        .vault
        .sync_value(&fixture.operator, &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Chain(ChainError::InvalidSignature { identity, .. }) if identity == mallory_id
    ));
    assert!(!fixture.holders(&id).await?.contains(&mallory_id));
    Ok(())
}

#[tokio::test]
async fn creator_cycle_is_detected() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(false).await?;
    let id = fixture.add_secret("VALUES.a", "s").await?;
    let vault_id = fixture.vault.id();
    let crypto = fixture.vault.crypto();

    let a = IdentityKeypair::generate();
    let b = IdentityKeypair::generate();
    let a_id = crypto.derive_identity_id(&a.public_key(), &vault_id);
    let b_id = crypto.derive_identity_id(&b.public_key(), &vault_id);

    for (name, keys, subject, creator) in [("a", &a, a_id, &b), ("b", &b, b_id, &a)] {
        let assertion = crypto.sign_creator_assertion(creator, &subject, &vault_id, now_millis())?;
        directory
            .add_identity(
                &vault_id,
                &NewIdentity {
                    id: subject,
                    name: name.into(),
                    public_key: keys.public_key(),
                    creator_verification: assertion,
                },
            )
            .await?;
        fixture.vault.add_rights(&subject, &["(r)VALUES.>"]).await?;
    }

    let err = fixture
        .vault
        .sync_value(&fixture.operator, &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Chain(ChainError::CyclicChain { .. })
    ));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Identities
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_rights_roll_back_the_identity() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    directory.fail(DirectoryOp::AddRights);

    let err = fixture.admit("alice", &["(r)VALUES.>"]).await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::Directory(DirectoryError::Unavailable(_))
    ));
    assert_eq!(fixture.vault.list_identities().await?.len(), 1);

    directory.fail(DirectoryOp::DeleteIdentity);
    let err = fixture.admit("bob", &["(r)VALUES.>"]).await.unwrap_err();
    assert!(matches!(err, VaultError::RollbackFailed { .. }));
    assert_eq!(fixture.vault.list_identities().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn identity_changes_require_identity_rights() -> anyhow::Result<()> {
    let (fixture, directory) = fixture(true).await?;
    let (carol, carol_keys) = fixture.admit("carol", &["(rw)VALUES.>"]).await?;
    let outsider = IdentityKeypair::generate();
    directory.reset_writes();

    for caller in [&outsider, &carol_keys] {
        let newcomer = IdentityKeypair::generate();
        assert!(matches!(
            fixture
                .vault
                .add_identity(caller, "newcomer", &newcomer.public_key(), &["(r)VALUES.>"])
                .await,
            Err(VaultError::Unauthorized(_))
        ));
    }
    assert!(matches!(
        fixture
            .vault
            .update_identity(&carol_keys, &carol.id, "carol", &["(rwd)IDENTITY.>"])
            .await,
        Err(VaultError::Unauthorized(_))
    ));
    assert!(matches!(
        fixture
            .vault
            .delete_identity(&outsider, &fixture.operator_id())
            .await,
        Err(VaultError::Unauthorized(_))
    ));
    assert_eq!(directory.writes(), 0);
    assert_eq!(fixture.vault.list_identities().await?.len(), 2);

    // A write right admits but does not delete.
    let (_, admin) = fixture.admit("admin", &["(w)IDENTITY.>"]).await?;
    let (bob, _) = fixture.admit_by(&admin, "bob", &[]).await?;
    assert!(matches!(
        fixture.vault.delete_identity(&admin, &bob.id).await,
        Err(VaultError::Unauthorized(_))
    ));
    fixture
        .vault
        .delete_identity(&fixture.operator, &bob.id)
        .await?;
    Ok(())
}

#[tokio::test]
async fn readmitting_a_key_conflicts() -> anyhow::Result<()> {
    let (fixture, _) = fixture(true).await?;
    let (_, alice) = fixture.admit("alice", &[]).await?;

    let err = fixture
        .vault
        .add_identity(&fixture.operator, "again", &alice.public_key(), &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Directory(DirectoryError::Conflict(_))
    ));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bearer_tokens_expire() -> anyhow::Result<()> {
    init_tracing();
    let directory = Arc::new(InstrumentedDirectory::memory());
    let config = VaultConfig {
        token_ttl: Duration::from_secs(30),
        ..VaultConfig::default()
    };
    let fixture = VaultFixture::with(directory, FlakyCrypto::new(), config).await?;

    let token = fixture.vault.bearer_token(&fixture.operator)?;
    let header = token.to_header_value()?;
    let parsed = passvault::core::BearerToken::from_header_value(&header)?;
    let key = fixture.operator.public_key().signing;

    let claims = parsed.verify(&key, &fixture.vault.id(), now_millis())?;
    assert_eq!(claims.identity_id, fixture.operator_id());

    let late = claims.expires_at + 1;
    assert!(matches!(
        parsed.verify(&key, &fixture.vault.id(), late),
        Err(CoreError::TokenExpired { .. })
    ));
    Ok(())
}
