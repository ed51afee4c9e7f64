use revcheck_crypto::{CanonicalHasher, Verifier};
use revcheck_types::LedgerHash;
use tracing::{info, warn};

use crate::config::VerifierConfig;
use crate::error::LedgerError;
use crate::revision::{BlockAddress, Revision, RevisionParser};
use crate::traits::{LedgerDigest, LedgerReader};

/// Result of checking one revision against the digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionOutcome {
    pub document_id: String,
    pub version: u64,
    pub block_address: BlockAddress,
    pub verified: bool,
}

/// Result of a validation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub digest: LedgerHash,
    pub digest_tip_address: BlockAddress,
    pub outcomes: Vec<RevisionOutcome>,
    /// The run stopped at the first failure before checking every revision.
    pub stopped_early: bool,
}

impl ValidationReport {
    /// Returns `true` if every revision checked was covered by the digest.
    pub fn is_valid(&self) -> bool {
        self.outcomes.iter().all(|o| o.verified)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RevisionOutcome> {
        self.outcomes.iter().filter(|o| !o.verified)
    }

    pub fn revisions_checked(&self) -> usize {
        self.outcomes.len()
    }
}

/// Checks committed revisions returned by a query against the ledger's
/// current digest.
///
/// For every row: parse it as a [`Revision`] (which recomputes its hash),
/// fetch its proof up to the digest tip, and verify it. Rows that cannot be
/// parsed or whose content does not match their stored hash abort the run
/// with an error. Proof mismatches are recorded in the report.
pub struct DocumentValidator<H> {
    parser: RevisionParser<H>,
    verifier: Verifier,
    fail_fast: bool,
}

impl<H: CanonicalHasher> DocumentValidator<H> {
    pub fn new(hasher: H) -> Self {
        Self::with_config(hasher, &VerifierConfig::default())
    }

    pub fn with_config(hasher: H, config: &VerifierConfig) -> Self {
        Self {
            parser: RevisionParser::new(hasher).with_ordering(config.hash_ordering),
            verifier: config.verifier(),
            fail_fast: config.fail_fast,
        }
    }

    pub fn parser(&self) -> &RevisionParser<H> {
        &self.parser
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Validate every revision matched by `statement`.
    pub fn validate<R>(&self, reader: &R, statement: &str) -> Result<ValidationReport, LedgerError>
    where
        R: LedgerReader + ?Sized,
    {
        let LedgerDigest {
            digest,
            digest_tip_address,
        } = reader.digest()?;
        let rows = reader.query(statement)?;

        let mut outcomes = Vec::with_capacity(rows.len());
        let mut stopped_early = false;
        for (index, row) in rows.iter().enumerate() {
            let revision = self.parser.parse(row)?;
            let verified = self.verify_revision(reader, &revision, &digest, &digest_tip_address)?;
            if !verified {
                warn!(
                    document_id = %revision.document_id(),
                    block = %revision.block_address(),
                    "revision not covered by ledger digest"
                );
            }
            outcomes.push(RevisionOutcome {
                document_id: revision.document_id().to_string(),
                version: revision.metadata().version,
                block_address: revision.block_address().clone(),
                verified,
            });
            if !verified && self.fail_fast {
                stopped_early = index + 1 < rows.len();
                break;
            }
        }

        let report = ValidationReport {
            digest,
            digest_tip_address,
            outcomes,
            stopped_early,
        };
        info!(
            checked = report.revisions_checked(),
            failed = report.failures().count(),
            valid = report.is_valid(),
            "validation run complete"
        );
        Ok(report)
    }

    /// Fetch the proof for one revision and check it against `digest`.
    pub fn verify_revision<R>(
        &self,
        reader: &R,
        revision: &Revision,
        digest: &LedgerHash,
        digest_tip: &BlockAddress,
    ) -> Result<bool, LedgerError>
    where
        R: LedgerReader + ?Sized,
    {
        let proof = reader.revision_proof(revision.document_id(), revision.block_address(), digest_tip)?;
        Ok(self
            .verifier
            .verify(revision.hash().as_bytes(), digest.as_bytes(), &proof)?)
    }
}
