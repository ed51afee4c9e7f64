use revcheck_types::{LedgerHash, Value};

use crate::error::LedgerError;
use crate::revision::BlockAddress;

/// A published ledger digest and the block it covers up to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerDigest {
    pub digest: LedgerHash,
    pub digest_tip_address: BlockAddress,
}

/// Read boundary for the ledger service.
///
/// Implementations own networking, sessions, and retries; a failure to reach
/// the service is reported as [`LedgerError::Service`].
pub trait LedgerReader: Send + Sync {
    /// Latest digest of the whole ledger.
    fn digest(&self) -> Result<LedgerDigest, LedgerError>;

    /// Serialized proof (Ion text list of blobs) linking the revision at
    /// `block_address` to the digest whose tip is `digest_tip`.
    fn revision_proof(
        &self,
        document_id: &str,
        block_address: &BlockAddress,
        digest_tip: &BlockAddress,
    ) -> Result<Vec<u8>, LedgerError>;

    /// Committed revision documents matching `statement`.
    fn query(&self, statement: &str) -> Result<Vec<Value>, LedgerError>;
}
