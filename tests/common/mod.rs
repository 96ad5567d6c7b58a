// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use account_api::application::{
    AccountProvisioner, AccountsObserver, CreatorIdentity, ProvisioningService, ShutdownSignal,
};
use account_api::domain::{Account, AccountPublicKey, Address, CreateAccountRequest};
use account_api::domain::SignatureAlgorithm;
use account_api::ledger::{
    AccountKey, BlockHeader, Event, InMemorySigner, LedgerError, LedgerGateway, SignerError,
    Transaction, TransactionOutcome, TransactionSigner,
};
use account_api::storage::{
    AccountStore, MemoryAccountStore, SqliteAccountStore, SqliteConfig, StoreError,
};
use anyhow::Result;
use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use tempfile::TempDir;

pub const CREATOR_ADDRESS: &str = "f8d6e0586b0a20c7";

/// Hex-encoded Ed25519 public key derived from a fixed seed byte.
pub fn ed25519_public_key(seed: u8) -> String {
    hex::encode(SigningKey::from_bytes(&[seed; 32]).verifying_key().to_bytes())
}

/// Hex-encoded P-256 public key (`X || Y`) derived from a fixed seed byte.
pub fn p256_public_key(seed: u8) -> String {
    use p256::elliptic_curve::sec1::ToEncodedPoint;

    let secret = p256::SecretKey::from_slice(&[seed; 32]).unwrap();
    hex::encode(&secret.public_key().to_encoded_point(false).as_bytes()[1..])
}

pub fn create_request(public_key: &str) -> CreateAccountRequest {
    CreateAccountRequest {
        public_key: public_key.to_string(),
        signature_algorithm: "ED25519".to_string(),
        hash_algorithm: "SHA3_256".to_string(),
    }
}

/// An account record with one Ed25519/SHA3-256 key per entry in `keys`.
pub fn account_with_keys(address: &str, keys: &[&str]) -> Account {
    keys.iter().fold(
        Account::new(address, format!("tx-{}", address)),
        |account, key| {
            account.with_public_key(AccountPublicKey::new(*key, "ED25519", "SHA3_256"))
        },
    )
}

/// Scripted ledger. Outcomes are served in order; the last one repeats.
pub struct MockLedger {
    creator_keys: Vec<AccountKey>,
    outcomes: Mutex<VecDeque<TransactionOutcome>>,
    fail_submit: bool,
    fail_account_lookup: bool,
    submit_delay: Option<Duration>,
    pub account_lookups: AtomicUsize,
    pub outcome_polls: AtomicUsize,
    pub submitted: Mutex<Vec<Transaction>>,
}

impl MockLedger {
    /// A ledger that seals every transaction with an account-created event
    /// for `address`.
    pub fn creating(address: &str) -> Self {
        Self::with_outcomes(vec![
            TransactionOutcome::pending(),
            TransactionOutcome::sealed(vec![Event::account_created(address)]),
        ])
    }

    pub fn with_outcomes(outcomes: Vec<TransactionOutcome>) -> Self {
        Self {
            creator_keys: vec![creator_key(0, 42)],
            outcomes: Mutex::new(outcomes.into()),
            fail_submit: false,
            fail_account_lookup: false,
            submit_delay: None,
            account_lookups: AtomicUsize::new(0),
            outcome_polls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// A ledger whose transactions never leave the pending state.
    pub fn never_sealing() -> Self {
        Self::with_outcomes(vec![TransactionOutcome::pending()])
    }

    pub fn with_creator_keys(mut self, keys: Vec<AccountKey>) -> Self {
        self.creator_keys = keys;
        self
    }

    pub fn failing_submit(mut self) -> Self {
        self.fail_submit = true;
        self
    }

    /// Hold every submission for `delay` before accepting it.
    pub fn slow_submit(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    pub fn failing_account_lookup(mut self) -> Self {
        self.fail_account_lookup = true;
        self
    }

    pub fn was_called(&self) -> bool {
        self.account_lookups.load(Ordering::SeqCst) > 0
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

pub fn creator_key(index: u32, sequence_number: u64) -> AccountKey {
    AccountKey {
        index,
        public_key: hex::encode(
            SigningKey::from_bytes(&[index as u8 + 100; 32])
                .verifying_key()
                .to_bytes(),
        ),
        signing_algorithm: "ED25519".to_string(),
        hashing_algorithm: "SHA3_256".to_string(),
        sequence_number,
        weight: 1000,
        revoked: false,
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn get_account_keys(&self, _address: &Address) -> Result<Vec<AccountKey>, LedgerError> {
        self.account_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_account_lookup {
            return Err(LedgerError::Unavailable("connection refused".to_string()));
        }
        Ok(self.creator_keys.clone())
    }

    async fn get_latest_block_header(&self) -> Result<BlockHeader, LedgerError> {
        Ok(BlockHeader {
            id: "ab".repeat(32),
            height: 7,
        })
    }

    async fn submit_transaction(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_submit {
            return Err(LedgerError::Rejected {
                status: 400,
                message: "invalid signature".to_string(),
            });
        }
        self.submitted.lock().unwrap().push(transaction.clone());
        Ok(())
    }

    async fn get_transaction_outcome(
        &self,
        _transaction_id: &str,
    ) -> Result<TransactionOutcome, LedgerError> {
        self.outcome_polls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            Ok(outcomes.pop_front().unwrap())
        } else {
            Ok(outcomes
                .front()
                .cloned()
                .unwrap_or_else(TransactionOutcome::pending))
        }
    }
}

/// In-memory store that counts insert attempts.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryAccountStore,
    pub inserts: AtomicUsize,
}

impl CountingStore {
    pub fn insert_attempts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for CountingStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_account(account).await
    }

    async fn get_account_by_public_key(&self, public_key: &str) -> Result<Account, StoreError> {
        self.inner.get_account_by_public_key(public_key).await
    }

    async fn get_account_count(&self) -> Result<u64, StoreError> {
        self.inner.get_account_count().await
    }
}

/// Observer that remembers every reported count.
#[derive(Default)]
pub struct RecordingObserver {
    pub counts: Mutex<Vec<u64>>,
}

impl RecordingObserver {
    pub fn last(&self) -> Option<u64> {
        self.counts.lock().unwrap().last().copied()
    }
}

impl AccountsObserver for RecordingObserver {
    fn accounts_counted(&self, count: u64) {
        self.counts.lock().unwrap().push(count);
    }
}

/// Signer whose backend rejects every signing request.
pub struct FailingSigner;

impl TransactionSigner for FailingSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }

    fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Err(SignerError::Backend("key vault unreachable".to_string()))
    }
}

pub fn creator() -> CreatorIdentity {
    creator_with_signer(Arc::new(InMemorySigner::new(SigningKey::from_bytes(
        &[100; 32],
    ))))
}

pub fn creator_with_signer(signer: Arc<dyn TransactionSigner>) -> CreatorIdentity {
    CreatorIdentity::new(CREATOR_ADDRESS.to_string(), 0, signer)
}

/// Provisioner over `ledger` with short timings suitable for tests.
pub fn test_provisioner(ledger: Arc<MockLedger>) -> AccountProvisioner {
    provisioner_for(ledger, creator())
}

pub fn provisioner_for(ledger: Arc<MockLedger>, creator: CreatorIdentity) -> AccountProvisioner {
    AccountProvisioner::new(ledger, creator)
        .with_poll_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_secs(5))
}

/// Everything a provisioning test needs to inspect after the call.
pub struct TestHarness {
    pub service: ProvisioningService,
    pub ledger: Arc<MockLedger>,
    pub store: Arc<CountingStore>,
    pub observer: Arc<RecordingObserver>,
}

pub fn harness(ledger: MockLedger, limit: u64) -> TestHarness {
    harness_with(ledger, limit, ShutdownSignal::never(), Duration::from_secs(5))
}

pub fn harness_with(
    ledger: MockLedger,
    limit: u64,
    shutdown: ShutdownSignal,
    timeout: Duration,
) -> TestHarness {
    build_harness(ledger, creator(), limit, shutdown, timeout)
}

/// Harness whose creator signs with `signer`.
pub fn harness_with_signer(
    ledger: MockLedger,
    signer: Arc<dyn TransactionSigner>,
) -> TestHarness {
    build_harness(
        ledger,
        creator_with_signer(signer),
        0,
        ShutdownSignal::never(),
        Duration::from_secs(5),
    )
}

fn build_harness(
    ledger: MockLedger,
    creator: CreatorIdentity,
    limit: u64,
    shutdown: ShutdownSignal,
    timeout: Duration,
) -> TestHarness {
    let ledger = Arc::new(ledger);
    let store = Arc::new(CountingStore::default());
    let observer = Arc::new(RecordingObserver::default());
    let provisioner = provisioner_for(ledger.clone(), creator)
        .with_timeout(timeout)
        .with_shutdown(shutdown);
    let service = ProvisioningService::new(provisioner, store.clone(), observer.clone(), limit);
    TestHarness {
        service,
        ledger,
        store,
        observer,
    }
}

/// Pre-populate a store with `n` accounts that are unrelated to the test keys.
pub async fn seed_accounts(store: &dyn AccountStore, n: u8) -> Result<()> {
    for i in 0..n {
        let address = format!("seed{:02}", i);
        let key = format!("{:02x}", i).repeat(32);
        store
            .insert_account(&account_with_keys(&address, &[&key]))
            .await?;
    }
    Ok(())
}

/// Helper to create a SQLite store in a temporary directory
pub async fn sqlite_store() -> Result<(SqliteAccountStore, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let store = SqliteAccountStore::init(&SqliteConfig::for_path(db_path.to_str().unwrap())).await?;
    Ok((store, temp_dir))
}
