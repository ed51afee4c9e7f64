use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, SubsecRound, Utc};
use revcheck_crypto::{CanonicalHasher, HashOrdering, ProofTree};
use revcheck_types::{LedgerHash, Value};
use tracing::debug;

use crate::error::LedgerError;
use crate::revision::{BlockAddress, Metadata, Revision, RevisionParser};
use crate::traits::{LedgerDigest, LedgerReader};

/// In-memory ledger for tests, local demos, and embedding.
///
/// Every committed revision lands on a single strand with increasing
/// sequence numbers. The digest is the root of a [`ProofTree`] over all
/// revision hashes in commit order.
pub struct InMemoryLedger<H> {
    strand_id: String,
    parser: RevisionParser<H>,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    revisions: Vec<StoredRevision>,
    tx_counter: u64,
}

struct StoredRevision {
    document_id: String,
    /// The committed document as the query interface returns it.
    document: Value,
    /// Hash the tree was built from; tampering never touches it.
    leaf: LedgerHash,
}

impl<H: CanonicalHasher> InMemoryLedger<H> {
    pub fn new(strand_id: impl Into<String>, hasher: H) -> Self {
        Self {
            strand_id: strand_id.into(),
            parser: RevisionParser::new(hasher),
            inner: RwLock::new(LedgerState::default()),
        }
    }

    pub fn with_ordering(mut self, ordering: HashOrdering) -> Self {
        self.parser = self.parser.with_ordering(ordering);
        self
    }

    pub fn strand_id(&self) -> &str {
        &self.strand_id
    }

    /// Commit a new revision of `document_id` stamped with the current time.
    pub fn insert(&self, document_id: &str, data: Value) -> Result<Revision, LedgerError> {
        self.insert_at(document_id, data, Utc::now())
    }

    /// Commit a new revision of `document_id` with an explicit transaction
    /// time.
    pub fn insert_at(
        &self,
        document_id: &str,
        data: Value,
        transaction_time: DateTime<Utc>,
    ) -> Result<Revision, LedgerError> {
        if !data.is_struct() {
            return Err(LedgerError::MalformedRevision(format!(
                "data must be a struct, found {}",
                data.type_name()
            )));
        }

        let mut state = self.write_state()?;
        let version = state
            .revisions
            .iter()
            .filter(|r| r.document_id == document_id)
            .count() as u64;
        let metadata = Metadata {
            document_id: document_id.to_string(),
            version,
            transaction_time: transaction_time.trunc_subsecs(3),
            transaction_id: format!("tx{:08}", state.tx_counter + 1),
        };
        let block_address = BlockAddress::new(self.strand_id.clone(), state.revisions.len() as u64);
        let metadata_value = metadata.to_value();
        let hash = self.parser.compute_hash(&metadata_value, &data)?;
        let document = committed_document(&block_address, &hash, data, metadata_value);

        let revision = self.parser.parse(&document)?;
        state.tx_counter += 1;
        state.revisions.push(StoredRevision {
            document_id: document_id.to_string(),
            document,
            leaf: hash,
        });
        debug!(
            document_id,
            version,
            block = %block_address,
            "committed revision"
        );
        Ok(revision)
    }

    pub fn revision_count(&self) -> Result<usize, LedgerError> {
        Ok(self.read_state()?.revisions.len())
    }

    /// Replace the data of the latest revision of `document_id`, keeping the
    /// stored hash.
    pub fn tamper_data(&self, document_id: &str, data: Value) -> Result<(), LedgerError> {
        self.update_latest(document_id, |fields| {
            set_field(fields, "data", data);
            Ok(())
        })
    }

    /// Replace the stored hash of the latest revision of `document_id`.
    pub fn tamper_hash(&self, document_id: &str, hash: LedgerHash) -> Result<(), LedgerError> {
        self.update_latest(document_id, |fields| {
            set_field(fields, "hash", Value::Blob(hash.into_bytes()));
            Ok(())
        })
    }

    /// Rewrite the latest revision of `document_id` with new data and a
    /// matching hash. The revision still parses, but the digest was built
    /// from the original hash, so its proof no longer verifies.
    pub fn rewrite_revision(&self, document_id: &str, data: Value) -> Result<(), LedgerError> {
        self.update_latest(document_id, |fields| {
            let metadata = fields
                .iter()
                .find(|(k, _)| k == "metadata")
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null);
            let hash = self.parser.compute_hash(&metadata, &data)?;
            set_field(fields, "data", data);
            set_field(fields, "hash", Value::Blob(hash.into_bytes()));
            Ok(())
        })
    }

    fn update_latest<F>(&self, document_id: &str, update: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut Vec<(String, Value)>) -> Result<(), LedgerError>,
    {
        let mut state = self.write_state()?;
        let stored = state
            .revisions
            .iter_mut()
            .rev()
            .find(|r| r.document_id == document_id)
            .ok_or_else(|| LedgerError::DocumentNotFound(document_id.to_string()))?;
        match &mut stored.document {
            Value::Struct(fields) => update(fields),
            _ => Err(LedgerError::MalformedRevision(
                "stored document is not a struct".into(),
            )),
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Service("ledger read lock poisoned".into()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Service("ledger write lock poisoned".into()))
    }

    fn tree_up_to(&self, state: &LedgerState, tip: usize) -> Result<ProofTree, LedgerError> {
        let leaves = state.revisions[..=tip].iter().map(|r| r.leaf.clone()).collect();
        Ok(ProofTree::from_leaves(leaves, self.parser.combiner())?)
    }

    fn tip_index(&self, state: &LedgerState, tip: &BlockAddress) -> Result<usize, LedgerError> {
        let index = usize::try_from(tip.sequence_no()).ok();
        match index {
            Some(i) if tip.strand_id() == self.strand_id && i < state.revisions.len() => Ok(i),
            _ => Err(LedgerError::Service(format!("unknown digest tip {tip}"))),
        }
    }
}

impl<H> LedgerReader for InMemoryLedger<H>
where
    H: CanonicalHasher + Send + Sync,
{
    fn digest(&self) -> Result<LedgerDigest, LedgerError> {
        let state = self.read_state()?;
        let Some(last) = state.revisions.len().checked_sub(1) else {
            return Err(LedgerError::Service("ledger has no committed revisions".into()));
        };
        let tree = self.tree_up_to(&state, last)?;
        Ok(LedgerDigest {
            digest: tree.root().clone(),
            digest_tip_address: BlockAddress::new(self.strand_id.clone(), last as u64),
        })
    }

    fn revision_proof(
        &self,
        document_id: &str,
        block_address: &BlockAddress,
        digest_tip: &BlockAddress,
    ) -> Result<Vec<u8>, LedgerError> {
        let state = self.read_state()?;
        let tip = self.tip_index(&state, digest_tip)?;
        let not_found = || LedgerError::DocumentNotFound(format!("{document_id} at {block_address}"));

        let index = usize::try_from(block_address.sequence_no())
            .ok()
            .filter(|&i| block_address.strand_id() == self.strand_id && i <= tip)
            .ok_or_else(not_found)?;
        if state.revisions[index].document_id != document_id {
            return Err(not_found());
        }

        let proof = self
            .tree_up_to(&state, tip)?
            .proof(index)
            .ok_or_else(not_found)?;
        Ok(proof.to_ion_text().into_bytes())
    }

    fn query(&self, statement: &str) -> Result<Vec<Value>, LedgerError> {
        let filter = parse_statement(statement)?;
        let state = self.read_state()?;
        Ok(state
            .revisions
            .iter()
            .filter(|r| filter.as_deref().map_or(true, |id| r.document_id == id))
            .map(|r| r.document.clone())
            .collect())
    }
}

fn committed_document(
    block_address: &BlockAddress,
    hash: &LedgerHash,
    data: Value,
    metadata: Value,
) -> Value {
    Value::structure([
        ("blockAddress", block_address.to_value()),
        ("hash", Value::Blob(hash.as_bytes().to_vec())),
        ("data", data),
        ("metadata", metadata),
    ])
}

fn set_field(fields: &mut [(String, Value)], name: &str, value: Value) {
    if let Some((_, slot)) = fields.iter_mut().find(|(k, _)| k == name) {
        *slot = value;
    }
}

/// Accepts `SELECT * FROM _ql_committed_<table>` with an optional
/// `WHERE metadata.id = '<id>'`. Returns the document id filter.
fn parse_statement(statement: &str) -> Result<Option<String>, LedgerError> {
    let unsupported = || LedgerError::Service(format!("unsupported statement: {statement}"));
    let text = statement.trim().trim_end_matches(';').trim_end();

    let rest = strip_keyword(text, "select")
        .map(str::trim_start)
        .and_then(|s| s.strip_prefix('*'))
        .map(str::trim_start)
        .and_then(|s| strip_keyword(s, "from"))
        .map(str::trim_start)
        .ok_or_else(unsupported)?;
    let (table, condition) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if strip_keyword(table, "_ql_committed").is_none() {
        return Err(unsupported());
    }

    let condition = condition.trim();
    if condition.is_empty() {
        return Ok(None);
    }
    let id = strip_keyword(condition, "where")
        .map(str::trim_start)
        .and_then(|s| strip_keyword(s, "metadata.id"))
        .map(str::trim_start)
        .and_then(|s| s.strip_prefix('='))
        .map(str::trim)
        .and_then(|s| s.strip_prefix('\''))
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(unsupported)?;
    Ok(Some(id.to_string()))
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let head = text.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword)
        .then(|| &text[keyword.len()..])
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use revcheck_crypto::{Proof, StructuralSha256, Verifier};

    use super::*;

    fn ledger() -> InMemoryLedger<StructuralSha256> {
        InMemoryLedger::new("JdxjkR9bSYB5jMHWcI464T", StructuralSha256)
    }

    fn vehicle(vin: &str, year: i64) -> Value {
        Value::structure([("VIN", Value::from(vin)), ("Year", Value::from(year))])
    }

    fn proof_for(ledger: &InMemoryLedger<StructuralSha256>, revision: &Revision, tip: &BlockAddress) -> Vec<u8> {
        ledger
            .revision_proof(revision.document_id(), revision.block_address(), tip)
            .unwrap()
    }

    #[test]
    fn insert_assigns_addresses_and_versions() {
        let ledger = ledger();
        let a0 = ledger.insert("a", vehicle("1", 2011)).unwrap();
        let b0 = ledger.insert("b", vehicle("2", 2012)).unwrap();
        let a1 = ledger.insert("a", vehicle("1", 2013)).unwrap();

        assert_eq!(a0.block_address().sequence_no(), 0);
        assert_eq!(b0.block_address().sequence_no(), 1);
        assert_eq!(a1.block_address().sequence_no(), 2);
        assert_eq!(a0.metadata().version, 0);
        assert_eq!(b0.metadata().version, 0);
        assert_eq!(a1.metadata().version, 1);
        assert_ne!(a0.metadata().transaction_id, a1.metadata().transaction_id);
        assert_eq!(ledger.revision_count().unwrap(), 3);
    }

    #[test]
    fn insert_truncates_time_to_millis() {
        let ledger = ledger();
        let time = Utc.with_ymd_and_hms(2019, 6, 5, 21, 43, 48).unwrap()
            + chrono::Duration::microseconds(506_789);
        let revision = ledger.insert_at("a", vehicle("1", 2011), time).unwrap();
        assert_eq!(
            revision.metadata().transaction_time,
            Utc.with_ymd_and_hms(2019, 6, 5, 21, 43, 48).unwrap() + chrono::Duration::milliseconds(506)
        );
    }

    #[test]
    fn failed_insert_leaves_no_transaction_gap() {
        let short_for_poison = |value: &Value| {
            if value.field("poison").is_some() {
                LedgerHash::from_vec(vec![0u8; 16])
            } else {
                StructuralSha256.hash_value(value)
            }
        };
        let ledger = InMemoryLedger::new("strand", short_for_poison);
        let poisoned = Value::structure([("poison", Value::from(true))]);
        let err = ledger.insert("a", poisoned).unwrap_err();
        assert!(matches!(err, LedgerError::Verify(_)));
        assert_eq!(ledger.revision_count().unwrap(), 0);

        let revision = ledger.insert("a", vehicle("1", 2011)).unwrap();
        assert_eq!(revision.metadata().transaction_id, "tx00000001");
        assert_eq!(revision.metadata().version, 0);
        assert_eq!(revision.block_address().sequence_no(), 0);
    }

    #[test]
    fn non_struct_data_rejected() {
        let err = ledger().insert("a", Value::from(1)).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedRevision(_)));
    }

    #[test]
    fn empty_ledger_has_no_digest() {
        assert!(matches!(ledger().digest().unwrap_err(), LedgerError::Service(_)));
    }

    #[test]
    fn digest_tip_is_last_block() {
        let ledger = ledger();
        ledger.insert("a", vehicle("1", 2011)).unwrap();
        ledger.insert("b", vehicle("2", 2012)).unwrap();
        let digest = ledger.digest().unwrap();
        assert_eq!(digest.digest_tip_address, BlockAddress::new(ledger.strand_id(), 1));
        assert!(digest.digest.is_well_formed());
    }

    #[test]
    fn every_revision_proof_verifies() {
        let ledger = ledger();
        let revisions: Vec<Revision> = (0..7)
            .map(|i| ledger.insert(&format!("doc{i}"), vehicle("v", 2000 + i)).unwrap())
            .collect();
        let digest = ledger.digest().unwrap();
        let verifier = Verifier::default();
        for revision in &revisions {
            let blob = proof_for(&ledger, revision, &digest.digest_tip_address);
            assert!(verifier
                .verify(revision.hash().as_bytes(), digest.digest.as_bytes(), &blob)
                .unwrap());
        }
    }

    #[test]
    fn proof_against_older_tip_matches_older_digest() {
        let ledger = ledger();
        let first = ledger.insert("a", vehicle("1", 2011)).unwrap();
        ledger.insert("b", vehicle("2", 2012)).unwrap();
        let old = ledger.digest().unwrap();
        ledger.insert("c", vehicle("3", 2013)).unwrap();

        let blob = proof_for(&ledger, &first, &old.digest_tip_address);
        assert!(Verifier::default()
            .verify(first.hash().as_bytes(), old.digest.as_bytes(), &blob)
            .unwrap());
    }

    #[test]
    fn proof_is_ion_list_of_blobs() {
        let ledger = ledger();
        let first = ledger.insert("a", vehicle("1", 2011)).unwrap();
        ledger.insert("b", vehicle("2", 2012)).unwrap();
        let tip = ledger.digest().unwrap().digest_tip_address;
        let proof = Proof::decode(&proof_for(&ledger, &first, &tip)).unwrap();
        assert_eq!(proof.len(), 1);
    }

    #[test]
    fn proof_for_wrong_document_not_found() {
        let ledger = ledger();
        let first = ledger.insert("a", vehicle("1", 2011)).unwrap();
        let tip = ledger.digest().unwrap().digest_tip_address;
        let err = ledger
            .revision_proof("b", first.block_address(), &tip)
            .unwrap_err();
        assert!(matches!(err, LedgerError::DocumentNotFound(_)));
    }

    #[test]
    fn proof_past_tip_not_found() {
        let ledger = ledger();
        ledger.insert("a", vehicle("1", 2011)).unwrap();
        let tip = ledger.digest().unwrap().digest_tip_address;
        let later = ledger.insert("b", vehicle("2", 2012)).unwrap();
        let err = ledger
            .revision_proof("b", later.block_address(), &tip)
            .unwrap_err();
        assert!(matches!(err, LedgerError::DocumentNotFound(_)));
    }

    #[test]
    fn unknown_tip_is_service_error() {
        let ledger = ledger();
        let first = ledger.insert("a", vehicle("1", 2011)).unwrap();
        let bogus = BlockAddress::new("other", 0);
        let err = ledger
            .revision_proof("a", first.block_address(), &bogus)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Service(_)));
    }

    #[test]
    fn query_all_and_by_id() {
        let ledger = ledger();
        ledger.insert("a", vehicle("1", 2011)).unwrap();
        ledger.insert("b", vehicle("2", 2012)).unwrap();
        ledger.insert("a", vehicle("1", 2013)).unwrap();

        assert_eq!(ledger.query("SELECT * FROM _ql_committed_Vehicle").unwrap().len(), 3);
        let rows = ledger
            .query("select * from _ql_committed_Vehicle where metadata.id = 'a';")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows
            .iter()
            .all(|r| r.field("metadata").and_then(|m| m.field("id")) == Some(&Value::from("a"))));
    }

    #[test]
    fn unsupported_statements_rejected() {
        let ledger = ledger();
        for statement in [
            "DELETE FROM Vehicle",
            "SELECT * FROM Vehicle",
            "SELECT VIN FROM _ql_committed_Vehicle",
            "SELECT * FROM _ql_committed_Vehicle WHERE data.VIN = 'x'",
            "SELECT * FROM _ql_committed_Vehicle WHERE metadata.id = a",
        ] {
            let err = ledger.query(statement).unwrap_err();
            assert!(matches!(err, LedgerError::Service(_)), "{statement}");
        }
    }

    #[test]
    fn queried_rows_reparse() {
        let ledger = ledger();
        let revision = ledger.insert("a", vehicle("1", 2011)).unwrap();
        let rows = ledger.query("SELECT * FROM _ql_committed_Vehicle").unwrap();
        let parser = RevisionParser::new(StructuralSha256);
        assert_eq!(parser.parse(&rows[0]).unwrap(), revision);
    }

    #[test]
    fn tampered_data_fails_reparse() {
        let ledger = ledger();
        ledger.insert("a", vehicle("1", 2011)).unwrap();
        ledger.tamper_data("a", vehicle("1", 1999)).unwrap();
        let rows = ledger.query("SELECT * FROM _ql_committed_Vehicle").unwrap();
        let err = RevisionParser::new(StructuralSha256).parse(&rows[0]).unwrap_err();
        assert!(matches!(err, LedgerError::RevisionHashMismatch { .. }));
    }

    #[test]
    fn tampered_hash_fails_reparse() {
        let ledger = ledger();
        ledger.insert("a", vehicle("1", 2011)).unwrap();
        ledger.tamper_hash("a", LedgerHash::sha256(b"forged")).unwrap();
        let rows = ledger.query("SELECT * FROM _ql_committed_Vehicle").unwrap();
        let err = RevisionParser::new(StructuralSha256).parse(&rows[0]).unwrap_err();
        assert!(matches!(err, LedgerError::RevisionHashMismatch { .. }));
    }

    #[test]
    fn rewritten_revision_parses_but_fails_proof() {
        let ledger = ledger();
        ledger.insert("a", vehicle("1", 2011)).unwrap();
        ledger.insert("b", vehicle("2", 2012)).unwrap();
        ledger.rewrite_revision("a", vehicle("1", 1999)).unwrap();

        let rows = ledger
            .query("SELECT * FROM _ql_committed_Vehicle WHERE metadata.id = 'a'")
            .unwrap();
        let revision = RevisionParser::new(StructuralSha256).parse(&rows[0]).unwrap();
        let digest = ledger.digest().unwrap();
        let blob = proof_for(&ledger, &revision, &digest.digest_tip_address);
        assert!(!Verifier::default()
            .verify(revision.hash().as_bytes(), digest.digest.as_bytes(), &blob)
            .unwrap());
    }

    #[test]
    fn tamper_unknown_document_not_found() {
        let err = ledger().tamper_data("missing", vehicle("1", 1)).unwrap_err();
        assert!(matches!(err, LedgerError::DocumentNotFound(_)));
    }

    #[test]
    fn ordering_changes_digest() {
        let reference = ledger();
        let unsigned = ledger().with_ordering(HashOrdering::BigEndianUnsigned);
        let time = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        for i in 0..16 {
            reference.insert_at(&format!("d{i}"), vehicle("v", i), time).unwrap();
            unsigned.insert_at(&format!("d{i}"), vehicle("v", i), time).unwrap();
        }
        assert_ne!(reference.digest().unwrap().digest, unsigned.digest().unwrap().digest);
    }
}
