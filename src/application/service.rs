use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::{
    Account, CreateAccountRequest, HashAlgorithm, SignatureAlgorithm, decode_public_key,
};
use crate::ledger::NewAccountKey;
use crate::storage::{AccountStore, StoreError};

use super::{AccountProvisioner, AccountsObserver, ServiceError};

/// Application service providing account provisioning and lookup.
/// This is the interface used by the HTTP API and the CLI.
pub struct ProvisioningService {
    provisioner: AccountProvisioner,
    store: Arc<dyn AccountStore>,
    observer: Arc<dyn AccountsObserver>,
    /// Maximum number of accounts to issue; zero means unlimited.
    account_limit: u64,
}

impl ProvisioningService {
    pub fn new(
        provisioner: AccountProvisioner,
        store: Arc<dyn AccountStore>,
        observer: Arc<dyn AccountsObserver>,
        account_limit: u64,
    ) -> Self {
        Self {
            provisioner,
            store,
            observer,
            account_limit,
        }
    }

    pub fn account_limit(&self) -> u64 {
        self.account_limit
    }

    /// Provision a new account for the requested key and record it.
    ///
    /// Each call is a single attempt: admission check, validation, ledger
    /// provisioning, then persistence. A failure at any stage ends the call.
    pub async fn create_account(
        &self,
        request: CreateAccountRequest,
    ) -> Result<Account, ServiceError> {
        self.check_admission().await?;
        self.provision_account(request).await
    }

    /// Everything in [`create_account`](Self::create_account) after the
    /// admission check. Callers run [`check_admission`](Self::check_admission)
    /// themselves first.
    pub async fn provision_account(
        &self,
        request: CreateAccountRequest,
    ) -> Result<Account, ServiceError> {
        let key = validate_request(&request)?;
        debug!(public_key = %key.public_key_hex(), "request validated, provisioning");

        let account = self.provisioner.create(&key).await?;

        if let Err(err) = self.store.insert_account(&account).await {
            // The ledger account exists regardless; only the local record is lost.
            error!(
                address = %account.address,
                tx_id = %account.creation_tx_id,
                error = %err,
                "account created on ledger but could not be stored"
            );
            return Err(match err {
                StoreError::AlreadyExists => ServiceError::AlreadyExists,
                StoreError::NotFound => {
                    ServiceError::StorageUnavailable(anyhow::anyhow!("unexpected not found"))
                }
                StoreError::Unavailable(e) => ServiceError::StorageUnavailable(e),
            });
        }

        info!(address = %account.address, "account provisioned");
        Ok(account)
    }

    /// Find the account that owns `public_key`.
    pub async fn lookup_account(&self, public_key: &str) -> Result<Account, ServiceError> {
        self.store
            .get_account_by_public_key(public_key)
            .await
            .map_err(|e| ServiceError::from_store(e, public_key))
    }

    /// Read the account count, report it, and refuse if the limit is reached.
    pub async fn check_admission(&self) -> Result<(), ServiceError> {
        let count = self.store.get_account_count().await.map_err(|e| {
            error!(error = %e, "could not count accounts created by service");
            ServiceError::from_store(e, "")
        })?;
        self.observer.accounts_counted(count);

        if self.account_limit != 0 && count >= self.account_limit {
            warn!(count, limit = self.account_limit, "account limit reached");
            return Err(ServiceError::LimitExceeded {
                limit: self.account_limit,
            });
        }
        Ok(())
    }
}

/// Turn a caller request into a key the provisioner can register.
pub fn validate_request(request: &CreateAccountRequest) -> Result<NewAccountKey, ServiceError> {
    let sig_algo = SignatureAlgorithm::from_str(&request.signature_algorithm)
        .ok_or_else(|| ServiceError::InvalidRequest("invalid signature algorithm".to_string()))?;

    let hash_algo = HashAlgorithm::from_str(&request.hash_algorithm)
        .ok_or_else(|| ServiceError::InvalidRequest("invalid hash algorithm".to_string()))?;

    let public_key = decode_public_key(sig_algo, &request.public_key).map_err(|e| {
        debug!(error = %e, "public key rejected");
        ServiceError::InvalidRequest("invalid public key".to_string())
    })?;

    Ok(NewAccountKey::full_weight(public_key, sig_algo, hash_algo))
}
