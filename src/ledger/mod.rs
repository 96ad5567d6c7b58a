//! Ledger-facing capabilities: the gateway to the access API, transaction
//! construction and envelope signing.

mod http;
mod signer;
mod transaction;

pub use http::*;
pub use signer::*;
pub use transaction::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Address;

/// Event type emitted by the ledger when a new account is created.
pub const ACCOUNT_CREATED_EVENT: &str = "flow.AccountCreated";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ledger rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected ledger response: {0}")]
    InvalidResponse(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// A key registered on an existing ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKey {
    pub index: u32,
    pub public_key: String,
    pub signing_algorithm: String,
    pub hashing_algorithm: String,
    pub sequence_number: u64,
    pub weight: u32,
    #[serde(default)]
    pub revoked: bool,
}

/// Header of a recent block, used as a transaction's reference block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub id: String,
    pub height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransactionStatus {
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Finalized => "finalized",
            TransactionStatus::Executed => "executed",
            TransactionStatus::Sealed => "sealed",
            TransactionStatus::Expired => "expired",
        }
    }
}

/// An event emitted while executing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn account_created(address: impl Into<String>) -> Self {
        Self {
            event_type: ACCOUNT_CREATED_EVENT.to_string(),
            payload: serde_json::json!({ "address": address.into() }),
        }
    }

    /// The created address, if this is an account-created event.
    pub fn created_address(&self) -> Option<&str> {
        if self.event_type != ACCOUNT_CREATED_EVENT {
            return None;
        }
        self.payload.get("address").and_then(|a| a.as_str())
    }
}

/// Current outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub status: TransactionStatus,
    #[serde(default)]
    pub events: Vec<Event>,
    /// Execution error reported by the ledger, if execution failed.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TransactionOutcome {
    pub fn pending() -> Self {
        Self {
            status: TransactionStatus::Pending,
            events: Vec::new(),
            error_message: None,
        }
    }

    pub fn sealed(events: Vec<Event>) -> Self {
        Self {
            status: TransactionStatus::Sealed,
            events,
            error_message: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn execution_error(&self) -> Option<&str> {
        self.error_message.as_deref().filter(|m| !m.is_empty())
    }
}

/// The operations the provisioning workflow needs from the ledger.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Keys currently registered on the account at `address`.
    async fn get_account_keys(&self, address: &Address) -> Result<Vec<AccountKey>, LedgerError>;

    async fn get_latest_block_header(&self) -> Result<BlockHeader, LedgerError>;

    async fn submit_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError>;

    async fn get_transaction_outcome(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionOutcome, LedgerError>;
}
