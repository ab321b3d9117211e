//! # Content Digest
//!
//! SHA-256 content digests used for law-text pinning, decision idempotency
//! keys, and ledger tamper evidence.
//!
//! Structured values are digested over canonical JSON: keys sorted,
//! no insignificant whitespace. `serde_json::Map` is ordered by key when the
//! `preserve_order` feature is off, which is the case in this workspace, so
//! a round trip through `serde_json::Value` is sufficient to canonicalize.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The hash algorithm used to produce a content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content-addressed digest with its algorithm tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The hash algorithm that produced this digest.
    pub algorithm: DigestAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Digest raw bytes with SHA-256.
    pub fn sha256(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self {
            algorithm: DigestAlgorithm::Sha256,
            bytes,
        }
    }

    /// Digest a serializable value over its canonical JSON form.
    pub fn of_canonical<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::sha256(&canonical_json_bytes(value)?))
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Serialize `value` to canonical JSON bytes (sorted keys, compact).
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_vec(&value)
}

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    ContentDigest::sha256(data).to_hex()
}
