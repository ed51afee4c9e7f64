use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// A hash as it travels through the ledger: revision hashes, proof entries,
/// and published digests.
///
/// Well-formed hashes are exactly [`LedgerHash::LENGTH`] bytes of SHA-256
/// output. The zero-length hash is the identity element for pairwise
/// combination. Other lengths are representable so that malformed input from
/// the ledger service can be carried to the point where it is rejected.
///
/// Equality is exact byte equality.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerHash(Vec<u8>);

impl LedgerHash {
    /// Length in bytes of a well-formed hash.
    pub const LENGTH: usize = 32;

    /// SHA-256 of raw bytes.
    pub fn sha256(data: &[u8]) -> Self {
        Self(Sha256::digest(data).to_vec())
    }

    /// Wrap already-computed hash bytes.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The empty (identity) hash.
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` for the zero-length identity hash.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if this hash has exactly [`LedgerHash::LENGTH`] bytes.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LENGTH
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(4)])
    }

    /// Parse from a hex string. Any length is accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Standard base64, the encoding the ledger service uses for digests.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, TypeError> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|e| TypeError::InvalidBase64(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerHash({}, {}B)", self.short_hex(), self.0.len())
    }
}

impl fmt::Display for LedgerHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for LedgerHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for LedgerHash {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for LedgerHash {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<LedgerHash> for Vec<u8> {
    fn from(hash: LedgerHash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for LedgerHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
