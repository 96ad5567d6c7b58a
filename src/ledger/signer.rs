use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::domain::SignatureAlgorithm;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("signature algorithm {0} is not supported by this signer")]
    UnsupportedAlgorithm(SignatureAlgorithm),

    #[error("signing backend failed: {0}")]
    Backend(String),
}

/// Produces signatures on behalf of the creator account.
pub trait TransactionSigner: Send + Sync {
    fn algorithm(&self) -> SignatureAlgorithm;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;
}

/// Signer holding an ed25519 private key in process memory.
pub struct InMemorySigner {
    key: SigningKey,
}

impl InMemorySigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Build a signer from a hex-encoded 32-byte private key.
    pub fn from_hex(
        algorithm: SignatureAlgorithm,
        private_key: &SecretString,
    ) -> Result<Self, SignerError> {
        if algorithm != SignatureAlgorithm::Ed25519 {
            return Err(SignerError::UnsupportedAlgorithm(algorithm));
        }

        let bytes = hex::decode(private_key.expose_secret().trim())
            .map_err(|e| SignerError::InvalidPrivateKey(e.to_string()))?;
        let raw: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SignerError::InvalidPrivateKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;

        Ok(Self::new(SigningKey::from_bytes(&raw)))
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().to_bytes())
    }
}

impl TransactionSigner for InMemorySigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}
