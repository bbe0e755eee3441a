//! Behavior every Directory backend must share, run against each of them.

use passvault_core::{
    CreatorAssertion, CryptoProvider, Direction, EncryptedCopy, Grant, IdentityKeypair,
    NewIdentity, Passframe, RightTarget, StandardCrypto, ValueType, Vault,
};

use crate::error::DirectoryError;
use crate::traits::Directory;

pub(crate) async fn run_all<D: Directory>(directory: &D) {
    vault_lifecycle(directory).await;
    identity_lifecycle(directory).await;
    rights_lifecycle(directory).await;
    value_lifecycle(directory).await;
    copies_are_all_or_nothing(directory).await;
    copy_updates_and_deletes(directory).await;
    read_access_follows_rights(directory).await;
    deleted_identity_keeps_copies(directory).await;
    vaults_are_isolated(directory).await;
}

struct Setup {
    vault: Vault,
    operator: IdentityKeypair,
}

async fn setup<D: Directory>(directory: &D) -> Setup {
    let operator = IdentityKeypair::generate();
    let vault = directory
        .create_vault("team", &operator.public_key())
        .await
        .unwrap();
    Setup { vault, operator }
}

fn admit(setup: &Setup, name: &str) -> (IdentityKeypair, NewIdentity) {
    let crypto = StandardCrypto::new();
    let keypair = crypto.generate_keypair();
    let id = crypto.derive_identity_id(&keypair.public_key(), &setup.vault.id);
    let assertion: CreatorAssertion = crypto
        .sign_creator_assertion(&setup.operator, &id, &setup.vault.id, 0)
        .unwrap();
    let new = NewIdentity {
        id,
        name: name.to_string(),
        public_key: keypair.public_key(),
        creator_verification: assertion,
    };
    (keypair, new)
}

fn read(pattern: &str) -> Grant {
    Grant {
        direction: Direction::Read,
        target: RightTarget::Values,
        pattern: pattern.to_string(),
    }
}

fn copy_for(new: &NewIdentity, bytes: &[u8]) -> EncryptedCopy {
    EncryptedCopy {
        identity_id: new.id,
        passframe: Passframe::from_bytes(bytes.to_vec()),
    }
}

async fn vault_lifecycle<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;

    let identities = directory.list_identities(&vault_id).await.unwrap();
    assert_eq!(identities.len(), 1);
    assert!(identities[0].is_operator());
    assert!(identities[0].creator_verification().is_none());
    assert_eq!(identities[0].public_key, s.operator.public_key());

    let rights = directory
        .list_rights(&vault_id, &identities[0].id)
        .await
        .unwrap();
    assert_eq!(rights.len(), 9);

    let renamed = directory.update_vault(&vault_id, "renamed").await.unwrap();
    assert_eq!(renamed.name, "renamed");
    assert_eq!(directory.get_vault(&vault_id).await.unwrap().name, "renamed");

    directory
        .create_value(&vault_id, "VALUES.a", ValueType::String)
        .await
        .unwrap();
    directory.delete_vault(&vault_id).await.unwrap();

    assert!(directory.get_vault(&vault_id).await.unwrap_err().is_not_found());
    assert!(directory
        .get_value_by_name(&vault_id, "VALUES.a")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(directory.delete_vault(&vault_id).await.unwrap_err().is_not_found());
}

async fn identity_lifecycle<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;
    let (_, alice) = admit(&s, "alice");

    let stored = directory.add_identity(&vault_id, &alice).await.unwrap();
    assert_eq!(stored.id, alice.id);
    assert!(!stored.is_operator());
    assert_eq!(
        stored.creator_verification(),
        Some(&alice.creator_verification)
    );

    assert!(matches!(
        directory.add_identity(&vault_id, &alice).await,
        Err(DirectoryError::Conflict(_))
    ));

    let (_, mut forged) = admit(&s, "mallory");
    forged.id = alice.id;
    assert!(matches!(
        directory.add_identity(&vault_id, &forged).await,
        Err(DirectoryError::InvalidData(_))
    ));

    let renamed = directory
        .update_identity(&vault_id, &alice.id, "alice-2")
        .await
        .unwrap();
    assert_eq!(renamed.name, "alice-2");
    assert_eq!(
        directory.get_identity(&vault_id, &alice.id).await.unwrap().name,
        "alice-2"
    );

    let (_, bob) = admit(&s, "bob");
    directory.add_identity(&vault_id, &bob).await.unwrap();
    let listed: Vec<_> = directory
        .list_identities(&vault_id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted);
    assert_eq!(listed.len(), 3);

    let operator_id = directory
        .list_identities(&vault_id)
        .await
        .unwrap()
        .into_iter()
        .find(|i| i.is_operator())
        .unwrap()
        .id;
    assert!(matches!(
        directory.delete_identity(&vault_id, &operator_id).await,
        Err(DirectoryError::Conflict(_))
    ));

    directory.delete_identity(&vault_id, &bob.id).await.unwrap();
    assert!(directory
        .get_identity(&vault_id, &bob.id)
        .await
        .unwrap_err()
        .is_not_found());
}

async fn rights_lifecycle<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;
    let (_, alice) = admit(&s, "alice");
    directory.add_identity(&vault_id, &alice).await.unwrap();

    let added = directory
        .add_rights(&vault_id, &alice.id, &[read("VALUES.a.>"), read("VALUES.b")])
        .await
        .unwrap();
    assert_eq!(added.len(), 2);

    let listed = directory.list_rights(&vault_id, &alice.id).await.unwrap();
    assert_eq!(listed, added);

    directory.delete_right(&vault_id, &added[0].id).await.unwrap();
    let listed = directory.list_rights(&vault_id, &alice.id).await.unwrap();
    assert_eq!(listed, vec![added[1].clone()]);
    assert!(directory
        .delete_right(&vault_id, &added[0].id)
        .await
        .unwrap_err()
        .is_not_found());

    directory
        .delete_all_rights_for_identity(&vault_id, &alice.id)
        .await
        .unwrap();
    assert!(directory
        .list_rights(&vault_id, &alice.id)
        .await
        .unwrap()
        .is_empty());

    let (_, ghost) = admit(&s, "ghost");
    assert!(directory
        .add_rights(&vault_id, &ghost.id, &[read("VALUES.a")])
        .await
        .unwrap_err()
        .is_not_found());
}

async fn value_lifecycle<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;

    let value = directory
        .create_value(&vault_id, "VALUES.db.password", ValueType::String)
        .await
        .unwrap();
    assert!(matches!(
        directory
            .create_value(&vault_id, "VALUES.db.password", ValueType::Json)
            .await,
        Err(DirectoryError::Conflict(_))
    ));

    let other = directory
        .create_value(&vault_id, "VALUES.db.user", ValueType::String)
        .await
        .unwrap();
    assert!(matches!(
        directory
            .update_value(&vault_id, &other.id, "VALUES.db.password", ValueType::String)
            .await,
        Err(DirectoryError::Conflict(_))
    ));

    let updated = directory
        .update_value(&vault_id, &value.id, "VALUES.db.secret", ValueType::Json)
        .await
        .unwrap();
    assert_eq!(updated.name, "VALUES.db.secret");
    assert_eq!(updated.value_type, ValueType::Json);

    // Keeping the same name is not a conflict with itself.
    directory
        .update_value(&vault_id, &value.id, "VALUES.db.secret", ValueType::String)
        .await
        .unwrap();

    let by_name = directory
        .get_value_by_name(&vault_id, "VALUES.db.secret")
        .await
        .unwrap();
    assert_eq!(by_name.value.id, value.id);
    assert!(directory
        .get_value_by_name(&vault_id, "VALUES.db.password")
        .await
        .unwrap_err()
        .is_not_found());

    directory.delete_value(&vault_id, &value.id).await.unwrap();
    assert!(directory
        .get_value_by_id(&vault_id, &value.id)
        .await
        .unwrap_err()
        .is_not_found());
}

async fn copies_are_all_or_nothing<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;
    let (_, alice) = admit(&s, "alice");
    let (_, bob) = admit(&s, "bob");
    let (_, stranger) = admit(&s, "stranger");
    directory.add_identity(&vault_id, &alice).await.unwrap();
    directory.add_identity(&vault_id, &bob).await.unwrap();

    let value = directory
        .create_value(&vault_id, "VALUES.a", ValueType::String)
        .await
        .unwrap();

    directory
        .add_identity_value(&vault_id, &value.id, &copy_for(&alice, b"1"))
        .await
        .unwrap();

    // Second copy for alice poisons the whole batch.
    let err = directory
        .add_identity_values(
            &vault_id,
            &value.id,
            &[copy_for(&bob, b"2"), copy_for(&alice, b"3")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Conflict(_)));

    // Same for an unknown holder.
    let err = directory
        .add_identity_values(
            &vault_id,
            &value.id,
            &[copy_for(&bob, b"2"), copy_for(&stranger, b"4")],
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // And for a holder repeated inside one batch.
    let err = directory
        .add_identity_values(
            &vault_id,
            &value.id,
            &[copy_for(&bob, b"2"), copy_for(&bob, b"5")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Conflict(_)));

    let record = directory.get_value_by_id(&vault_id, &value.id).await.unwrap();
    assert_eq!(record.copies.len(), 1);
    assert!(record.is_held_by(&alice.id));
    assert!(!record.is_held_by(&bob.id));
}

async fn copy_updates_and_deletes<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;
    let (_, alice) = admit(&s, "alice");
    let (_, bob) = admit(&s, "bob");
    directory.add_identity(&vault_id, &alice).await.unwrap();
    directory.add_identity(&vault_id, &bob).await.unwrap();

    let a = directory
        .create_value(&vault_id, "VALUES.b", ValueType::String)
        .await
        .unwrap();
    let b = directory
        .create_value(&vault_id, "VALUES.a", ValueType::String)
        .await
        .unwrap();

    let stored = directory
        .add_identity_values(&vault_id, &a.id, &[copy_for(&alice, b"1"), copy_for(&bob, b"2")])
        .await
        .unwrap();
    directory
        .add_identity_value(&vault_id, &b.id, &copy_for(&alice, b"3"))
        .await
        .unwrap();

    let record = directory.get_value_by_id(&vault_id, &a.id).await.unwrap();
    let holders: Vec<_> = record.copies.iter().map(|c| c.identity_id).collect();
    let mut sorted = holders.clone();
    sorted.sort();
    assert_eq!(holders, sorted);

    let new_frame = Passframe::from_bytes(b"rotated".to_vec());
    let updated = directory
        .update_identity_value(&vault_id, &a.id, &alice.id, &new_frame)
        .await
        .unwrap();
    assert_eq!(updated.passframe, new_frame);
    let record = directory.get_value_by_id(&vault_id, &a.id).await.unwrap();
    assert_eq!(record.copy_for(&alice.id).unwrap().passframe, new_frame);

    let related: Vec<_> = directory
        .list_values_related_to_identity(&vault_id, &alice.id)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(related, vec!["VALUES.a", "VALUES.b"]);

    let bobs = stored.iter().find(|c| c.identity_id == bob.id).unwrap();
    directory
        .delete_identity_value(&vault_id, &bobs.id)
        .await
        .unwrap();
    assert!(directory
        .update_identity_value(&vault_id, &a.id, &bob.id, &new_frame)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(directory
        .list_values_related_to_identity(&vault_id, &bob.id)
        .await
        .unwrap()
        .is_empty());

    directory.delete_value(&vault_id, &a.id).await.unwrap();
    let related = directory
        .list_values_related_to_identity(&vault_id, &alice.id)
        .await
        .unwrap();
    assert_eq!(related.len(), 1);
}

async fn read_access_follows_rights<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;
    let (_, deep) = admit(&s, "deep");
    let (_, single) = admit(&s, "single");
    let (_, writer) = admit(&s, "writer");
    let (_, other) = admit(&s, "other");
    for new in [&deep, &single, &writer, &other] {
        directory.add_identity(&vault_id, new).await.unwrap();
    }

    directory
        .add_rights(&vault_id, &deep.id, &[read("VALUES.db.>"), read("VALUES.>")])
        .await
        .unwrap();
    directory
        .add_rights(&vault_id, &single.id, &[read("VALUES.db.*")])
        .await
        .unwrap();
    directory
        .add_rights(
            &vault_id,
            &writer.id,
            &[Grant {
                direction: Direction::Write,
                ..read("VALUES.db.>")
            }],
        )
        .await
        .unwrap();
    directory
        .add_rights(&vault_id, &other.id, &[read("VALUES.web.*")])
        .await
        .unwrap();

    let entitled = directory
        .list_identities_with_read_access(&vault_id, "VALUES.db.password")
        .await
        .unwrap();
    let ids: Vec<_> = entitled.iter().map(|i| i.id).collect();

    // Operator, deep (once, despite two matching rights) and single.
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&deep.id));
    assert!(ids.contains(&single.id));
    assert!(entitled.iter().any(|i| i.is_operator()));
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let nested = directory
        .list_identities_with_read_access(&vault_id, "VALUES.db.pg.password")
        .await
        .unwrap();
    assert!(nested.iter().any(|i| i.id == deep.id));
    assert!(!nested.iter().any(|i| i.id == single.id));
}

async fn deleted_identity_keeps_copies<D: Directory>(directory: &D) {
    let s = setup(directory).await;
    let vault_id = s.vault.id;
    let (_, alice) = admit(&s, "alice");
    directory.add_identity(&vault_id, &alice).await.unwrap();
    directory
        .add_rights(&vault_id, &alice.id, &[read("VALUES.>")])
        .await
        .unwrap();

    let value = directory
        .create_value(&vault_id, "VALUES.a", ValueType::String)
        .await
        .unwrap();
    directory
        .add_identity_value(&vault_id, &value.id, &copy_for(&alice, b"1"))
        .await
        .unwrap();

    directory.delete_identity(&vault_id, &alice.id).await.unwrap();

    assert!(directory
        .list_rights(&vault_id, &alice.id)
        .await
        .unwrap()
        .is_empty());
    let entitled = directory
        .list_identities_with_read_access(&vault_id, "VALUES.a")
        .await
        .unwrap();
    assert!(!entitled.iter().any(|i| i.id == alice.id));

    let record = directory.get_value_by_id(&vault_id, &value.id).await.unwrap();
    assert!(record.is_held_by(&alice.id));
}

async fn vaults_are_isolated<D: Directory>(directory: &D) {
    let first = setup(directory).await;
    let second = setup(directory).await;

    let value = directory
        .create_value(&first.vault.id, "VALUES.a", ValueType::String)
        .await
        .unwrap();

    // Same name is free in another vault.
    directory
        .create_value(&second.vault.id, "VALUES.a", ValueType::String)
        .await
        .unwrap();

    assert!(directory
        .get_value_by_id(&second.vault.id, &value.id)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(directory
        .delete_value(&second.vault.id, &value.id)
        .await
        .unwrap_err()
        .is_not_found());

    // An identity derived for one vault cannot be admitted into another.
    let (_, alice) = admit(&first, "alice");
    assert!(matches!(
        directory.add_identity(&second.vault.id, &alice).await,
        Err(DirectoryError::InvalidData(_))
    ));
}
