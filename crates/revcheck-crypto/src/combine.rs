use std::cmp::Ordering;

use revcheck_types::LedgerHash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{VerifyError, VerifyResult};

/// How two hashes are ordered before they are concatenated.
///
/// The order decides which hash comes first inside the SHA-256 input, so it
/// must match the ledger that published the digest bit for bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashOrdering {
    /// The ledger's published verifiers: scan from the last byte to the
    /// first, the first unequal byte decides, bytes compare as signed 8-bit
    /// integers.
    #[default]
    Reference,
    /// Unsigned magnitude with byte 0 most significant (plain slice order).
    BigEndianUnsigned,
}

impl HashOrdering {
    /// Compare two full-length hashes.
    pub fn compare(self, h1: &[u8], h2: &[u8]) -> VerifyResult<Ordering> {
        require_full_length(h1)?;
        require_full_length(h2)?;
        let ordering = match self {
            HashOrdering::Reference => h1
                .iter()
                .zip(h2)
                .rev()
                .map(|(a, b)| (*a as i8).cmp(&(*b as i8)))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal),
            HashOrdering::BigEndianUnsigned => h1.cmp(h2),
        };
        Ok(ordering)
    }
}

fn require_full_length(hash: &[u8]) -> VerifyResult<()> {
    if hash.len() != LedgerHash::LENGTH {
        return Err(VerifyError::InvalidHashLength {
            expected: LedgerHash::LENGTH,
            actual: hash.len(),
        });
    }
    Ok(())
}

/// Order-normalizing pairwise hash combiner.
///
/// `combine(a, b)` sorts the two hashes with its [`HashOrdering`],
/// concatenates them smaller first, and returns SHA-256 of the result. The
/// empty hash is an identity: combining with it returns the other input
/// unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HashCombiner {
    ordering: HashOrdering,
}

impl HashCombiner {
    /// Combiner compatible with ledger-published digests.
    pub const REFERENCE: Self = Self {
        ordering: HashOrdering::Reference,
    };

    pub const fn new(ordering: HashOrdering) -> Self {
        Self { ordering }
    }

    pub fn ordering(&self) -> HashOrdering {
        self.ordering
    }

    /// Combine two hashes. Non-empty inputs must be exactly 32 bytes.
    pub fn combine(&self, h1: &[u8], h2: &[u8]) -> VerifyResult<LedgerHash> {
        if h1.is_empty() {
            return Ok(LedgerHash::from(h2));
        }
        if h2.is_empty() {
            return Ok(LedgerHash::from(h1));
        }
        let (first, second) = match self.ordering.compare(h1, h2)? {
            Ordering::Less => (h1, h2),
            _ => (h2, h1),
        };
        let mut hasher = Sha256::new();
        hasher.update(first);
        hasher.update(second);
        Ok(LedgerHash::from_vec(hasher.finalize().to_vec()))
    }
}

/// Combine two hashes with the reference ordering.
pub fn combine(h1: &[u8], h2: &[u8]) -> VerifyResult<LedgerHash> {
    HashCombiner::REFERENCE.combine(h1, h2)
}
