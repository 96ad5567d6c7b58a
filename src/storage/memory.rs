use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::domain::{Account, Address};

use super::{AccountStore, StoreError};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Address, Account>,
    public_keys: HashMap<String, Address>,
}

/// Process-local account store behind a single reader/writer lock.
#[derive(Default)]
pub struct MemoryAccountStore {
    inner: RwLock<Inner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable(anyhow!("account store lock poisoned"))
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        // All constraints are checked before anything is written.
        if inner.accounts.contains_key(&account.address) {
            return Err(StoreError::AlreadyExists);
        }
        let mut seen = HashSet::new();
        for key in &account.public_keys {
            if inner.public_keys.contains_key(&key.public_key) || !seen.insert(&key.public_key) {
                return Err(StoreError::AlreadyExists);
            }
        }

        for key in &account.public_keys {
            inner
                .public_keys
                .insert(key.public_key.clone(), account.address.clone());
        }
        inner.accounts.insert(account.address.clone(), account.clone());

        Ok(())
    }

    async fn get_account_by_public_key(&self, public_key: &str) -> Result<Account, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;

        inner
            .public_keys
            .get(public_key)
            .and_then(|address| inner.accounts.get(address))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_account_count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.accounts.len() as u64)
    }
}
