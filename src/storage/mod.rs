mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Account;

/// SQL migration for initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("account with address or public key already exists")]
    AlreadyExists,

    #[error("account not found")]
    NotFound,

    #[error("storage unavailable: {0:#}")]
    Unavailable(#[from] anyhow::Error),
}

/// Registry of issued accounts.
///
/// Implementations enforce that addresses and public keys are each unique
/// across the whole store, and write an account together with all of its
/// keys or not at all.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persist an account and all its keys. Fails with
    /// [`StoreError::AlreadyExists`] if the address or any key is taken.
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    /// The account owning `public_key`, with its full key list.
    async fn get_account_by_public_key(&self, public_key: &str) -> Result<Account, StoreError>;

    /// Total number of accounts ever inserted.
    async fn get_account_count(&self) -> Result<u64, StoreError>;
}
