use revcheck_types::LedgerHash;
use tracing::debug;

use crate::combine::{HashCombiner, HashOrdering};
use crate::error::{VerifyError, VerifyResult};
use crate::proof::Proof;

/// Verifies a revision hash against a published ledger digest.
///
/// Verification:
/// 1. Decode the proof blob into a [`Proof`]
/// 2. Fold the revision hash through the proof to build a candidate digest
/// 3. Compare the candidate with the published digest byte for byte
///
/// `Ok(false)` means the check ran and the revision is not covered by the
/// digest. `Err` means the check could not run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verifier {
    combiner: HashCombiner,
    max_proof_length: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self {
            combiner: HashCombiner::REFERENCE,
            max_proof_length: Self::DEFAULT_MAX_PROOF_LENGTH,
        }
    }
}

impl Verifier {
    /// Proofs longer than this are rejected as malformed.
    pub const DEFAULT_MAX_PROOF_LENGTH: usize = 256;

    pub fn new(ordering: HashOrdering) -> Self {
        Self {
            combiner: HashCombiner::new(ordering),
            ..Default::default()
        }
    }

    pub fn with_max_proof_length(mut self, max_proof_length: usize) -> Self {
        self.max_proof_length = max_proof_length;
        self
    }

    pub fn combiner(&self) -> &HashCombiner {
        &self.combiner
    }

    pub fn max_proof_length(&self) -> usize {
        self.max_proof_length
    }

    /// Verify `document_hash` against `digest` using a serialized proof.
    pub fn verify(
        &self,
        document_hash: &[u8],
        digest: &[u8],
        proof_blob: &[u8],
    ) -> VerifyResult<bool> {
        let proof = self.decode_proof(proof_blob)?;
        self.verify_proof(document_hash, digest, &proof)
    }

    /// Verify with an already decoded proof.
    pub fn verify_proof(
        &self,
        document_hash: &[u8],
        digest: &[u8],
        proof: &Proof,
    ) -> VerifyResult<bool> {
        let candidate = self.build_candidate_digest(proof, document_hash)?;
        let verified = candidate.as_bytes() == digest;
        debug!(
            proof_len = proof.len(),
            candidate = %candidate.short_hex(),
            verified,
            "built candidate digest"
        );
        Ok(verified)
    }

    /// Decode a proof blob, enforcing the configured length bound.
    pub fn decode_proof(&self, proof_blob: &[u8]) -> VerifyResult<Proof> {
        let proof = Proof::decode(proof_blob)?;
        if proof.len() > self.max_proof_length {
            return Err(VerifyError::MalformedProof(format!(
                "{} internal hashes exceeds limit of {}",
                proof.len(),
                self.max_proof_length
            )));
        }
        Ok(proof)
    }

    /// Candidate digest for the whole ledger, built from the leaf and the
    /// proof's internal hashes.
    pub fn build_candidate_digest(&self, proof: &Proof, leaf: &[u8]) -> VerifyResult<LedgerHash> {
        proof.reconstruct_root(leaf, &self.combiner)
    }
}

/// Verify with the reference ordering and default limits.
pub fn verify(document_hash: &[u8], digest: &[u8], proof_blob: &[u8]) -> VerifyResult<bool> {
    Verifier::default().verify(document_hash, digest, proof_blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::combine;
    use crate::mutate::flip_random_bit;

    fn vector(fill: u8) -> LedgerHash {
        let mut bytes = [fill; 32];
        bytes[0] = fill.wrapping_mul(7);
        LedgerHash::from(bytes)
    }

    fn fixture() -> (LedgerHash, LedgerHash, LedgerHash, LedgerHash) {
        let leaf = LedgerHash::sha256(b"leafdata");
        let s1 = vector(0x11);
        let s2 = vector(0xa2);
        let candidate = combine(
            combine(leaf.as_bytes(), s1.as_bytes()).unwrap().as_bytes(),
            s2.as_bytes(),
        )
        .unwrap();
        (leaf, s1, s2, candidate)
    }

    fn encode(hashes: &[LedgerHash]) -> Vec<u8> {
        Proof::new(hashes.to_vec()).to_ion_text().into_bytes()
    }

    #[test]
    fn genuine_proof_verifies() {
        let (leaf, s1, s2, candidate) = fixture();
        let blob = encode(&[s1, s2]);
        assert!(verify(leaf.as_bytes(), candidate.as_bytes(), &blob).unwrap());
    }

    #[test]
    fn flipped_sibling_fails() {
        let (leaf, s1, s2, candidate) = fixture();
        let tampered = LedgerHash::from_vec(flip_random_bit(s2.as_bytes()).unwrap());
        let blob = encode(&[s1, tampered]);
        assert!(!verify(leaf.as_bytes(), candidate.as_bytes(), &blob).unwrap());
    }

    #[test]
    fn flipped_document_hash_fails() {
        let (leaf, s1, s2, candidate) = fixture();
        let blob = encode(&[s1, s2]);
        for _ in 0..32 {
            let tampered = flip_random_bit(leaf.as_bytes()).unwrap();
            assert!(!verify(&tampered, candidate.as_bytes(), &blob).unwrap());
        }
    }

    #[test]
    fn flipped_digest_fails() {
        let (leaf, s1, s2, candidate) = fixture();
        let blob = encode(&[s1, s2]);
        let tampered = flip_random_bit(candidate.as_bytes()).unwrap();
        assert!(!verify(leaf.as_bytes(), &tampered, &blob).unwrap());
    }

    #[test]
    fn sibling_order_matters() {
        let (leaf, s1, s2, candidate) = fixture();
        let blob = encode(&[s2, s1]);
        assert!(!verify(leaf.as_bytes(), candidate.as_bytes(), &blob).unwrap());
    }

    #[test]
    fn empty_proof_compares_leaf() {
        let leaf = LedgerHash::sha256(b"leafdata");
        assert!(verify(leaf.as_bytes(), leaf.as_bytes(), b"[]").unwrap());
    }

    #[test]
    fn short_internal_hash_is_error() {
        let (leaf, s1, _, candidate) = fixture();
        let blob = encode(&[s1, LedgerHash::from_vec(vec![1u8; 16])]);
        let err = verify(leaf.as_bytes(), candidate.as_bytes(), &blob).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidHashLength { actual: 16, .. }));
    }

    #[test]
    fn malformed_blob_is_error() {
        let (leaf, _, _, candidate) = fixture();
        let err = verify(leaf.as_bytes(), candidate.as_bytes(), b"{oops").unwrap_err();
        assert!(matches!(err, VerifyError::MalformedProof(_)));
    }

    #[test]
    fn bare_comma_proof_is_error() {
        let leaf = LedgerHash::sha256(b"leafdata");
        let err = verify(leaf.as_bytes(), leaf.as_bytes(), b"[,]").unwrap_err();
        assert!(matches!(err, VerifyError::MalformedProof(_)));
    }

    #[test]
    fn oversized_proof_rejected() {
        let (leaf, s1, s2, candidate) = fixture();
        let blob = encode(&[s1, s2]);
        let verifier = Verifier::default().with_max_proof_length(1);
        let err = verifier
            .verify(leaf.as_bytes(), candidate.as_bytes(), &blob)
            .unwrap_err();
        assert!(matches!(err, VerifyError::MalformedProof(_)));
    }

    #[test]
    fn ordering_must_match_publisher() {
        let leaf = LedgerHash::from([0x80u8; 32]);
        let sibling = LedgerHash::from([0x01u8; 32]);
        let blob = encode(&[sibling.clone()]);
        let digest = combine(leaf.as_bytes(), sibling.as_bytes()).unwrap();

        assert!(Verifier::new(HashOrdering::Reference)
            .verify(leaf.as_bytes(), digest.as_bytes(), &blob)
            .unwrap());
        assert!(!Verifier::new(HashOrdering::BigEndianUnsigned)
            .verify(leaf.as_bytes(), digest.as_bytes(), &blob)
            .unwrap());
    }
}
