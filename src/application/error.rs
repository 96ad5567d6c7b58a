use thiserror::Error;

use crate::ledger::{LedgerError, SignerError};
use crate::storage::StoreError;

/// Failures of a single provisioning attempt against the ledger.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("creator account {address} has no key at index {index}")]
    CreatorKeyUnavailable { address: String, index: u32 },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[source] LedgerError),

    #[error("failed to sign transaction: {0}")]
    SigningFailed(#[from] SignerError),

    #[error("failed to submit transaction: {0}")]
    SubmissionFailed(#[source] LedgerError),

    #[error("failed to execute transaction (id={tx_id}): {message}")]
    TransactionExecutionFailed { tx_id: String, message: String },

    #[error("transaction {tx_id} sealed without an account-created event")]
    AccountCreatedEventMissing { tx_id: String },

    /// `tx_id` is set once the transaction has been signed and handed to
    /// the ledger.
    #[error("provisioning timed out (transaction: {})", .tx_id.as_deref().unwrap_or("not submitted"))]
    TimedOut { tx_id: Option<String> },

    #[error("provisioning cancelled")]
    Cancelled,
}

/// Errors returned by [`ProvisioningService`](super::ProvisioningService).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("account limit of {limit} reached")]
    LimitExceeded { limit: u64 },

    #[error("account with address or public key already exists")]
    AlreadyExists,

    #[error("account with public key {0} does not exist")]
    NotFound(String),

    #[error(transparent)]
    Provisioning(#[from] ProvisionError),

    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),
}

impl ServiceError {
    /// Map a store error observed while looking up `public_key`.
    pub(crate) fn from_store(err: StoreError, public_key: &str) -> Self {
        match err {
            StoreError::AlreadyExists => ServiceError::AlreadyExists,
            StoreError::NotFound => ServiceError::NotFound(public_key.to_string()),
            StoreError::Unavailable(e) => ServiceError::StorageUnavailable(e),
        }
    }
}
