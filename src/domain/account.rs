use serde::{Deserialize, Serialize};

/// Ledger-assigned account address, kept exactly as the ledger reports it.
pub type Address = String;

/// An account issued by this service.
///
/// Accounts are written once, right after the creating transaction seals, and
/// are never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Reserved secondary address; always empty for accounts created today.
    #[serde(rename = "lockedAddress")]
    pub locked_address: String,
    /// Transaction that created the account. Kept for auditing only.
    #[serde(rename = "creationTxId")]
    pub creation_tx_id: String,
    #[serde(rename = "publicKeys")]
    pub public_keys: Vec<AccountPublicKey>,
}

impl Account {
    pub fn new(address: impl Into<Address>, creation_tx_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            locked_address: String::new(),
            creation_tx_id: creation_tx_id.into(),
            public_keys: Vec::new(),
        }
    }

    /// Attach a key, linking it back to this account's address.
    pub fn with_public_key(mut self, mut key: AccountPublicKey) -> Self {
        key.account_address = self.address.clone();
        self.public_keys.push(key);
        self
    }

    pub fn owns_key(&self, public_key: &str) -> bool {
        self.public_keys.iter().any(|k| k.public_key == public_key)
    }
}

/// A public key bound to an account at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPublicKey {
    /// Back-reference to the owning account; not part of the JSON shape.
    #[serde(skip)]
    pub account_address: Address,
    /// Lowercase hex encoding of the key material.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "signatureAlgorithm")]
    pub sig_algo: String,
    #[serde(rename = "hashAlgorithm")]
    pub hash_algo: String,
}

impl AccountPublicKey {
    pub fn new(
        public_key: impl Into<String>,
        sig_algo: impl Into<String>,
        hash_algo: impl Into<String>,
    ) -> Self {
        Self {
            account_address: Address::new(),
            public_key: public_key.into(),
            sig_algo: sig_algo.into(),
            hash_algo: hash_algo.into(),
        }
    }
}

/// Caller-supplied request to provision a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "signatureAlgorithm")]
    pub signature_algorithm: String,
    #[serde(rename = "hashAlgorithm")]
    pub hash_algorithm: String,
}
