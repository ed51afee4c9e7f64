use revcheck_types::{LedgerHash, Value};
use serde::{Deserialize, Serialize};

use crate::combine::HashCombiner;
use crate::error::{VerifyError, VerifyResult};

/// Audit proof for one revision: the sibling hashes needed to walk from the
/// revision's hash up to the ledger digest.
///
/// The order is the traversal order from the leaf upward and is never
/// sorted. Hash lengths are not checked on decode; the combiner rejects bad
/// lengths when the proof is folded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    internal_hashes: Vec<LedgerHash>,
}

impl Proof {
    pub fn new(internal_hashes: Vec<LedgerHash>) -> Self {
        Self { internal_hashes }
    }

    pub fn internal_hashes(&self) -> &[LedgerHash] {
        &self.internal_hashes
    }

    pub fn len(&self) -> usize {
        self.internal_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal_hashes.is_empty()
    }

    /// Decode a proof blob as handed over by the ledger service (UTF-8 Ion
    /// text holding a list of blobs).
    pub fn decode(blob: &[u8]) -> VerifyResult<Self> {
        let text = std::str::from_utf8(blob)
            .map_err(|e| VerifyError::MalformedProof(format!("not UTF-8 text: {e}")))?;
        Self::from_ion_text(text)
    }

    /// Decode from Ion text such as `[{{base64}},{{base64}}]`.
    pub fn from_ion_text(text: &str) -> VerifyResult<Self> {
        let items = revcheck_ion::parse_list(text)
            .map_err(|e| VerifyError::MalformedProof(e.to_string()))?;
        let internal_hashes = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Blob(bytes) => Ok(LedgerHash::from_vec(bytes)),
                other => Err(VerifyError::MalformedProof(format!(
                    "element {index} is a {}, not a blob",
                    other.type_name()
                ))),
            })
            .collect::<VerifyResult<Vec<_>>>()?;
        Ok(Self { internal_hashes })
    }

    /// Encode in the same Ion text form the ledger service uses.
    pub fn to_ion_text(&self) -> String {
        let list = Value::List(
            self.internal_hashes
                .iter()
                .map(|h| Value::Blob(h.as_bytes().to_vec()))
                .collect(),
        );
        revcheck_ion::to_text(&list)
    }

    /// Fold `leaf` through the proof: `acc = combine(acc, sibling)` for each
    /// sibling in order. An empty proof returns the leaf itself.
    pub fn reconstruct_root(
        &self,
        leaf: &[u8],
        combiner: &HashCombiner,
    ) -> VerifyResult<LedgerHash> {
        self.internal_hashes
            .iter()
            .try_fold(LedgerHash::from(leaf), |acc, sibling| {
                combiner.combine(acc.as_bytes(), sibling.as_bytes())
            })
    }
}

/// Reconstruct the root with the reference ordering.
pub fn reconstruct_root(proof: &Proof, leaf: &[u8]) -> VerifyResult<LedgerHash> {
    proof.reconstruct_root(leaf, &HashCombiner::REFERENCE)
}
