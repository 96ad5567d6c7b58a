use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Address, HashAlgorithm, SignatureAlgorithm};

use super::{SignerError, TransactionSigner};

/// Key weight that grants full authority over an account.
pub const ACCOUNT_KEY_WEIGHT_THRESHOLD: u32 = 1000;

/// Gas limit for account-creation transactions.
pub const CREATE_ACCOUNT_GAS_LIMIT: u64 = 100;

/// Domain separation tag prefixed to every signed transaction envelope,
/// right-padded with zeros to 32 bytes.
const TRANSACTION_DOMAIN_TAG: &[u8] = b"FLOW-V0.0-transaction";

const CREATE_ACCOUNT_SCRIPT: &str = r#"transaction(publicKeys: [String]) {
    prepare(signer: AuthAccount) {
        let account = AuthAccount(payer: signer)
        for key in publicKeys {
            account.addPublicKey(key.decodeHex())
        }
    }
}"#;

/// A key to register on a newly created account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccountKey {
    pub public_key: Vec<u8>,
    pub sig_algo: SignatureAlgorithm,
    pub hash_algo: HashAlgorithm,
    pub weight: u32,
}

impl NewAccountKey {
    /// A key with full authority over the new account.
    pub fn full_weight(
        public_key: Vec<u8>,
        sig_algo: SignatureAlgorithm,
        hash_algo: HashAlgorithm,
    ) -> Self {
        Self {
            public_key,
            sig_algo,
            hash_algo,
            weight: ACCOUNT_KEY_WEIGHT_THRESHOLD,
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    fn to_argument(&self) -> serde_json::Value {
        serde_json::json!({
            "publicKey": self.public_key_hex(),
            "signatureAlgorithm": self.sig_algo.as_str(),
            "hashAlgorithm": self.hash_algo.as_str(),
            "weight": self.weight,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalKey {
    pub address: Address,
    pub key_index: u32,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub address: Address,
    pub key_index: u32,
    /// Hex-encoded signature bytes.
    pub signature: String,
}

/// A ledger transaction as submitted to the access API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub script: String,
    pub arguments: Vec<serde_json::Value>,
    pub reference_block_id: String,
    pub gas_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: Address,
    pub authorizers: Vec<Address>,
    pub envelope_signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// Build an account-creation transaction authorized by `creator`.
    /// Reference block, gas limit and proposal key must still be set.
    pub fn create_account(keys: &[NewAccountKey], creator: &Address) -> Self {
        Self {
            script: CREATE_ACCOUNT_SCRIPT.to_string(),
            arguments: keys.iter().map(NewAccountKey::to_argument).collect(),
            reference_block_id: String::new(),
            gas_limit: 0,
            proposal_key: ProposalKey {
                address: creator.clone(),
                key_index: 0,
                sequence_number: 0,
            },
            payer: creator.clone(),
            authorizers: vec![creator.clone()],
            envelope_signatures: Vec::new(),
        }
    }

    pub fn with_reference_block(mut self, block_id: impl Into<String>) -> Self {
        self.reference_block_id = block_id.into();
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_proposal_key(mut self, address: Address, key_index: u32, sequence: u64) -> Self {
        self.proposal_key = ProposalKey {
            address,
            key_index,
            sequence_number: sequence,
        };
        self
    }

    pub fn with_payer(mut self, payer: Address) -> Self {
        self.payer = payer;
        self
    }

    /// Canonical bytes covered by envelope signatures: the domain tag
    /// followed by every payload field, each length-prefixed.
    pub fn envelope_message(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);

        let mut tag = [0u8; 32];
        tag[..TRANSACTION_DOMAIN_TAG.len()].copy_from_slice(TRANSACTION_DOMAIN_TAG);
        out.extend_from_slice(&tag);

        put(&mut out, self.script.as_bytes());
        put(&mut out, &(self.arguments.len() as u64).to_be_bytes());
        for argument in &self.arguments {
            put(&mut out, argument.to_string().as_bytes());
        }
        put(&mut out, self.reference_block_id.as_bytes());
        put(&mut out, &self.gas_limit.to_be_bytes());
        put(&mut out, self.proposal_key.address.as_bytes());
        put(&mut out, &self.proposal_key.key_index.to_be_bytes());
        put(&mut out, &self.proposal_key.sequence_number.to_be_bytes());
        put(&mut out, self.payer.as_bytes());
        put(&mut out, &(self.authorizers.len() as u64).to_be_bytes());
        for authorizer in &self.authorizers {
            put(&mut out, authorizer.as_bytes());
        }

        out
    }

    /// Sign the envelope as `address` using the key at `key_index`.
    pub fn sign_envelope(
        &mut self,
        address: &Address,
        key_index: u32,
        signer: &dyn TransactionSigner,
    ) -> Result<(), SignerError> {
        let signature = signer.sign(&self.envelope_message())?;
        self.envelope_signatures.push(TransactionSignature {
            address: address.clone(),
            key_index,
            signature: hex::encode(signature),
        });
        Ok(())
    }

    /// Hex SHA-256 digest of the envelope together with its signatures.
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.envelope_message());
        for sig in &self.envelope_signatures {
            hasher.update(sig.address.as_bytes());
            hasher.update(sig.key_index.to_be_bytes());
            hasher.update(sig.signature.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

fn put(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u32).to_be_bytes());
    out.extend_from_slice(field);
}
