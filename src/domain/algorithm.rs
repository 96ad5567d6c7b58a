use std::fmt;

use ed25519_dalek::VerifyingKey;
use thiserror::Error;

/// Signature schemes an account key may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    EcdsaP256,
    EcdsaSecp256k1,
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::EcdsaP256 => "ECDSA_P256",
            SignatureAlgorithm::EcdsaSecp256k1 => "ECDSA_secp256k1",
            SignatureAlgorithm::Ed25519 => "ED25519",
        }
    }

    /// Parse an algorithm name. Case is ignored and `-` is read as `_`, so
    /// `ed25519` and `ecdsa-p256` are accepted. Unknown names yield `None`.
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "ECDSA_P256" => Some(SignatureAlgorithm::EcdsaP256),
            "ECDSA_SECP256K1" => Some(SignatureAlgorithm::EcdsaSecp256k1),
            "ED25519" => Some(SignatureAlgorithm::Ed25519),
            _ => None,
        }
    }

    /// Length in bytes of an encoded public key for this scheme.
    /// ECDSA keys are the raw `X || Y` point coordinates.
    pub fn public_key_len(&self) -> usize {
        match self {
            SignatureAlgorithm::EcdsaP256 | SignatureAlgorithm::EcdsaSecp256k1 => 64,
            SignatureAlgorithm::Ed25519 => 32,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hash functions an account key may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha2_256,
    Sha2_384,
    Sha3_256,
    Sha3_384,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha2_256 => "SHA2_256",
            HashAlgorithm::Sha2_384 => "SHA2_384",
            HashAlgorithm::Sha3_256 => "SHA3_256",
            HashAlgorithm::Sha3_384 => "SHA3_384",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "SHA2_256" => Some(HashAlgorithm::Sha2_256),
            "SHA2_384" => Some(HashAlgorithm::Sha2_384),
            "SHA3_256" => Some(HashAlgorithm::Sha3_256),
            "SHA3_384" => Some(HashAlgorithm::Sha3_384),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_uppercase().replace('-', "_")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("public key is empty")]
    Empty,

    #[error("public key is not valid hex: {0}")]
    InvalidHex(String),

    #[error("{algorithm} public key must be {expected} bytes, got {actual}")]
    InvalidLength {
        algorithm: SignatureAlgorithm,
        expected: usize,
        actual: usize,
    },

    #[error("{0} public key is not a valid curve point")]
    InvalidPoint(SignatureAlgorithm),
}

/// Decode a hex-encoded public key under the given signature scheme.
///
/// The decoded bytes must be a point on the scheme's curve. ECDSA keys are
/// the uncompressed `X || Y` coordinates without the SEC1 tag byte.
pub fn decode_public_key(
    algorithm: SignatureAlgorithm,
    encoded: &str,
) -> Result<Vec<u8>, KeyDecodeError> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(KeyDecodeError::Empty);
    }

    let bytes = hex::decode(encoded).map_err(|e| KeyDecodeError::InvalidHex(e.to_string()))?;

    let expected = algorithm.public_key_len();
    if bytes.len() != expected {
        return Err(KeyDecodeError::InvalidLength {
            algorithm,
            expected,
            actual: bytes.len(),
        });
    }

    if !is_curve_point(algorithm, &bytes) {
        return Err(KeyDecodeError::InvalidPoint(algorithm));
    }

    Ok(bytes)
}

fn is_curve_point(algorithm: SignatureAlgorithm, bytes: &[u8]) -> bool {
    match algorithm {
        SignatureAlgorithm::Ed25519 => <[u8; 32]>::try_from(bytes)
            .is_ok_and(|raw| VerifyingKey::from_bytes(&raw).is_ok()),
        SignatureAlgorithm::EcdsaP256 => {
            p256::PublicKey::from_sec1_bytes(&uncompressed_sec1(bytes)).is_ok()
        }
        SignatureAlgorithm::EcdsaSecp256k1 => {
            k256::PublicKey::from_sec1_bytes(&uncompressed_sec1(bytes)).is_ok()
        }
    }
}

fn uncompressed_sec1(coordinates: &[u8]) -> Vec<u8> {
    let mut sec1 = Vec::with_capacity(coordinates.len() + 1);
    sec1.push(0x04);
    sec1.extend_from_slice(coordinates);
    sec1
}
