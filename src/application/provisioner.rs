use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::{Account, AccountPublicKey, Address};
use crate::ledger::{
    CREATE_ACCOUNT_GAS_LIMIT, LedgerGateway, NewAccountKey, Transaction, TransactionOutcome,
    TransactionSigner, TransactionStatus,
};

use super::{ProvisionError, ShutdownSignal};

/// Default interval between transaction outcome polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on a whole provisioning call, seal wait included.
pub const DEFAULT_SEAL_TIMEOUT: Duration = Duration::from_secs(120);

/// The operator-controlled account that pays for and authorizes every
/// account-creation transaction.
#[derive(Clone)]
pub struct CreatorIdentity {
    pub address: Address,
    pub key_index: u32,
    pub signer: Arc<dyn TransactionSigner>,
}

impl CreatorIdentity {
    pub fn new(address: Address, key_index: u32, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            address,
            key_index,
            signer,
        }
    }
}

/// Creates ledger accounts: builds, signs and submits the creation
/// transaction, then waits for it to seal.
pub struct AccountProvisioner {
    ledger: Arc<dyn LedgerGateway>,
    creator: CreatorIdentity,
    poll_interval: Duration,
    timeout: Duration,
    shutdown: ShutdownSignal,
}

/// Per-call deadline and cancellation, applied to every ledger round-trip.
struct CallGuard {
    deadline: Instant,
    shutdown: ShutdownSignal,
    tx_id: Option<String>,
}

impl CallGuard {
    async fn run<T>(&mut self, fut: impl Future<Output = T>) -> Result<T, ProvisionError> {
        if self.shutdown.is_triggered() {
            return Err(ProvisionError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(ProvisionError::Cancelled),
            res = tokio::time::timeout_at(self.deadline, fut) => res.map_err(|_| {
                ProvisionError::TimedOut { tx_id: self.tx_id.clone() }
            }),
        }
    }
}

impl AccountProvisioner {
    pub fn new(ledger: Arc<dyn LedgerGateway>, creator: CreatorIdentity) -> Self {
        Self {
            ledger,
            creator,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_SEAL_TIMEOUT,
            shutdown: ShutdownSignal::never(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn creator(&self) -> &CreatorIdentity {
        &self.creator
    }

    /// Create a ledger account bound to `key` and return its record.
    /// Nothing is persisted here.
    pub async fn create(&self, key: &NewAccountKey) -> Result<Account, ProvisionError> {
        let mut guard = CallGuard {
            deadline: Instant::now() + self.timeout,
            shutdown: self.shutdown.clone(),
            tx_id: None,
        };
        let creator = &self.creator;

        let creator_keys = guard
            .run(self.ledger.get_account_keys(&creator.address))
            .await?
            .map_err(ProvisionError::LedgerUnavailable)?;
        let creator_key = creator_keys
            .get(creator.key_index as usize)
            .ok_or_else(|| ProvisionError::CreatorKeyUnavailable {
                address: creator.address.clone(),
                index: creator.key_index,
            })?;

        let reference_block = guard
            .run(self.ledger.get_latest_block_header())
            .await?
            .map_err(ProvisionError::LedgerUnavailable)?;

        let mut tx = Transaction::create_account(std::slice::from_ref(key), &creator.address)
            .with_reference_block(reference_block.id)
            .with_gas_limit(CREATE_ACCOUNT_GAS_LIMIT)
            .with_proposal_key(
                creator.address.clone(),
                creator.key_index,
                creator_key.sequence_number,
            )
            .with_payer(creator.address.clone());

        tx.sign_envelope(&creator.address, creator.key_index, creator.signer.as_ref())?;
        let tx_id = tx.id();

        // A submission cut off by the deadline may still land on the ledger.
        guard.tx_id = Some(tx_id.clone());
        guard
            .run(self.ledger.submit_transaction(&tx))
            .await?
            .map_err(ProvisionError::SubmissionFailed)?;
        debug!(tx_id = %tx_id, "account creation submitted, awaiting seal");

        let outcome = self.wait_for_seal(&mut guard, &tx_id).await?;

        if let Some(message) = outcome.execution_error() {
            return Err(ProvisionError::TransactionExecutionFailed {
                tx_id,
                message: message.to_string(),
            });
        }

        let address = created_address(&outcome)
            .ok_or_else(|| ProvisionError::AccountCreatedEventMissing {
                tx_id: tx_id.clone(),
            })?
            .to_string();

        info!(address = %address, tx_id = %tx_id, "account created on ledger");

        Ok(Account::new(address, tx_id).with_public_key(AccountPublicKey::new(
            key.public_key_hex(),
            key.sig_algo.as_str(),
            key.hash_algo.as_str(),
        )))
    }

    /// Poll the outcome until the transaction seals. Transport errors are
    /// returned immediately.
    async fn wait_for_seal(
        &self,
        guard: &mut CallGuard,
        tx_id: &str,
    ) -> Result<TransactionOutcome, ProvisionError> {
        loop {
            let outcome = guard
                .run(self.ledger.get_transaction_outcome(tx_id))
                .await?
                .map_err(ProvisionError::LedgerUnavailable)?;

            match outcome.status {
                TransactionStatus::Sealed => return Ok(outcome),
                TransactionStatus::Expired => {
                    return Err(ProvisionError::TransactionExecutionFailed {
                        tx_id: tx_id.to_string(),
                        message: "transaction expired before sealing".to_string(),
                    });
                }
                status => debug!(tx_id, status = status.as_str(), "transaction not sealed yet"),
            }

            guard.run(tokio::time::sleep(self.poll_interval)).await?;
        }
    }
}

/// Address from the last account-created event, if any. Empty addresses
/// count as missing.
fn created_address(outcome: &TransactionOutcome) -> Option<&str> {
    outcome
        .events
        .iter()
        .filter_map(|e| e.created_address())
        .filter(|a| !a.is_empty())
        .last()
}
