mod common;

use std::sync::Arc;

use account_api::domain::AccountPublicKey;
use account_api::storage::{AccountStore, MemoryAccountStore, StoreError};
use anyhow::Result;
use common::{account_with_keys, sqlite_store};
use tokio::task::JoinSet;

const KEY_A: &str = "aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11aa11";
const KEY_B: &str = "bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22bb22";
const KEY_C: &str = "cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33cc33";

/// Run a contract check against every store implementation.
macro_rules! store_contract {
    ($name:ident, $check:ident) => {
        mod $name {
            use super::*;

            #[tokio::test]
            async fn memory() -> Result<()> {
                $check(&MemoryAccountStore::new()).await
            }

            #[tokio::test]
            async fn sqlite() -> Result<()> {
                let (store, _temp) = sqlite_store().await?;
                $check(&store).await
            }
        }
    };
}

store_contract!(insert_then_lookup, check_insert_then_lookup);
store_contract!(duplicate_address, check_duplicate_address_rejected);
store_contract!(duplicate_key, check_duplicate_key_rejected);
store_contract!(multi_key_insert, check_multi_key_insert_is_atomic);
store_contract!(unknown_key, check_unknown_key_not_found);
store_contract!(count, check_count_tracks_inserts);

mod concurrent_same_key {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn memory() -> Result<()> {
        check_concurrent_inserts_of_one_key(Arc::new(MemoryAccountStore::new())).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sqlite() -> Result<()> {
        let (store, _temp) = sqlite_store().await?;
        check_concurrent_inserts_of_one_key(Arc::new(store)).await
    }
}

async fn check_insert_then_lookup(store: &dyn AccountStore) -> Result<()> {
    let account = account_with_keys("0x01", &[KEY_A]);
    store.insert_account(&account).await?;

    let found = store.get_account_by_public_key(KEY_A).await?;
    assert_eq!(found.address, "0x01");
    assert_eq!(found.creation_tx_id, "tx-0x01");
    assert_eq!(found.locked_address, "");
    assert_eq!(found.public_keys.len(), 1);

    let key = &found.public_keys[0];
    assert_eq!(key.public_key, KEY_A);
    assert_eq!(key.sig_algo, "ED25519");
    assert_eq!(key.hash_algo, "SHA3_256");
    assert_eq!(key.account_address, "0x01");

    Ok(())
}

async fn check_duplicate_address_rejected(store: &dyn AccountStore) -> Result<()> {
    store
        .insert_account(&account_with_keys("0x01", &[KEY_A]))
        .await?;

    let err = store
        .insert_account(&account_with_keys("0x01", &[KEY_B]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    // Nothing from the rejected insert is visible
    assert!(matches!(
        store.get_account_by_public_key(KEY_B).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(store.get_account_count().await?, 1);

    Ok(())
}

async fn check_duplicate_key_rejected(store: &dyn AccountStore) -> Result<()> {
    store
        .insert_account(&account_with_keys("0x01", &[KEY_A]))
        .await?;

    let err = store
        .insert_account(&account_with_keys("0x02", &[KEY_A]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    assert_eq!(store.get_account_count().await?, 1);
    assert_eq!(store.get_account_by_public_key(KEY_A).await?.address, "0x01");

    Ok(())
}

async fn check_multi_key_insert_is_atomic(store: &dyn AccountStore) -> Result<()> {
    store
        .insert_account(&account_with_keys("0x01", &[KEY_A]))
        .await?;

    // KEY_C is new but KEY_A is taken; the whole account must be rejected
    let err = store
        .insert_account(&account_with_keys("0x02", &[KEY_C, KEY_A]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
    assert!(matches!(
        store.get_account_by_public_key(KEY_C).await,
        Err(StoreError::NotFound)
    ));

    // The same key twice within one account is also a conflict
    let doubled = account_with_keys("0x03", &[KEY_B])
        .with_public_key(AccountPublicKey::new(KEY_B, "ED25519", "SHA2_256"));
    assert!(matches!(
        store.insert_account(&doubled).await,
        Err(StoreError::AlreadyExists)
    ));
    assert!(matches!(
        store.get_account_by_public_key(KEY_B).await,
        Err(StoreError::NotFound)
    ));

    // A clean two-key account is stored whole, keys in insertion order
    store
        .insert_account(&account_with_keys("0x04", &[KEY_C, KEY_B]))
        .await?;
    let by_first = store.get_account_by_public_key(KEY_C).await?;
    let by_second = store.get_account_by_public_key(KEY_B).await?;
    assert_eq!(by_first, by_second);
    assert_eq!(by_first.address, "0x04");
    let keys: Vec<_> = by_first
        .public_keys
        .iter()
        .map(|k| k.public_key.as_str())
        .collect();
    assert_eq!(keys, vec![KEY_C, KEY_B]);

    assert_eq!(store.get_account_count().await?, 2);
    Ok(())
}

async fn check_unknown_key_not_found(store: &dyn AccountStore) -> Result<()> {
    assert!(matches!(
        store.get_account_by_public_key(KEY_A).await,
        Err(StoreError::NotFound)
    ));

    store
        .insert_account(&account_with_keys("0x01", &[KEY_A]))
        .await?;
    assert!(matches!(
        store.get_account_by_public_key(KEY_B).await,
        Err(StoreError::NotFound)
    ));

    Ok(())
}

async fn check_count_tracks_inserts(store: &dyn AccountStore) -> Result<()> {
    assert_eq!(store.get_account_count().await?, 0);

    store
        .insert_account(&account_with_keys("0x01", &[KEY_A]))
        .await?;
    store
        .insert_account(&account_with_keys("0x02", &[KEY_B, KEY_C]))
        .await?;
    assert_eq!(store.get_account_count().await?, 2);

    // Failed inserts do not count
    let _ = store
        .insert_account(&account_with_keys("0x03", &[KEY_A]))
        .await;
    assert_eq!(store.get_account_count().await?, 2);

    Ok(())
}

async fn check_concurrent_inserts_of_one_key(store: Arc<dyn AccountStore>) -> Result<()> {
    let mut inserts = JoinSet::new();
    for i in 0..16 {
        let store = store.clone();
        inserts.spawn(async move {
            let account = account_with_keys(&format!("0x{:02}", i), &[KEY_A]);
            store.insert_account(&account).await
        });
    }

    let mut succeeded = 0;
    let mut conflicts = 0;
    while let Some(joined) = inserts.join_next().await {
        match joined? {
            Ok(()) => succeeded += 1,
            Err(StoreError::AlreadyExists) => conflicts += 1,
            Err(err) => return Err(err.into()),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(store.get_account_count().await?, 1);

    let owner = store.get_account_by_public_key(KEY_A).await?;
    assert_eq!(owner.public_keys.len(), 1);
    Ok(())
}
