use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use revcheck_crypto::{CanonicalHasher, HashCombiner, HashOrdering};
use revcheck_types::{LedgerHash, Value};
use tracing::{debug, warn};

use crate::error::LedgerError;

/// Location of a revision in the ledger's hash chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockAddress {
    strand_id: String,
    sequence_no: u64,
}

impl BlockAddress {
    pub fn new(strand_id: impl Into<String>, sequence_no: u64) -> Self {
        Self {
            strand_id: strand_id.into(),
            sequence_no,
        }
    }

    pub fn strand_id(&self) -> &str {
        &self.strand_id
    }

    pub fn sequence_no(&self) -> u64 {
        self.sequence_no
    }

    /// Parse from a struct with `strandId` (string) and `sequenceNo` (int).
    pub fn from_value(value: &Value) -> Result<Self, LedgerError> {
        let fields = require_struct(value, "blockAddress")?;
        Ok(Self {
            strand_id: required_str(fields, "strandId")?.to_string(),
            sequence_no: required_u64(fields, "sequenceNo")?,
        })
    }

    /// Parse from Ion text, as the ledger service returns a digest tip address.
    pub fn from_ion_text(text: &str) -> Result<Self, LedgerError> {
        Self::from_value(&revcheck_ion::parse(text)?)
    }

    pub fn to_value(&self) -> Value {
        Value::structure([
            ("strandId", Value::from(self.strand_id.as_str())),
            ("sequenceNo", Value::Int(i128::from(self.sequence_no))),
        ])
    }

    /// Ion text form used when requesting a proof for this address.
    pub fn to_ion_text(&self) -> String {
        revcheck_ion::to_text(&self.to_value())
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strand_id, self.sequence_no)
    }
}

/// Provenance of a revision.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Metadata {
    pub document_id: String,
    pub version: u64,
    /// UTC, truncated to millisecond precision.
    pub transaction_time: DateTime<Utc>,
    pub transaction_id: String,
}

impl Metadata {
    /// Parse from a struct with `id`, `version`, `txTime`, and `txId`.
    pub fn from_value(value: &Value) -> Result<Self, LedgerError> {
        let fields = require_struct(value, "metadata")?;
        let tx_time = required(fields, "txTime")?;
        let transaction_time = tx_time
            .as_timestamp()
            .ok_or_else(|| wrong_type("txTime", "timestamp", tx_time))?
            .with_timezone(&Utc)
            .trunc_subsecs(3);
        Ok(Self {
            document_id: required_str(fields, "id")?.to_string(),
            version: required_u64(fields, "version")?,
            transaction_time,
            transaction_id: required_str(fields, "txId")?.to_string(),
        })
    }

    pub fn to_value(&self) -> Value {
        Value::structure([
            ("id", Value::from(self.document_id.as_str())),
            ("version", Value::Int(i128::from(self.version))),
            ("txTime", Value::Timestamp(self.transaction_time.into())),
            ("txId", Value::from(self.transaction_id.as_str())),
        ])
    }
}

/// A committed document revision whose stored hash has been checked against
/// its content.
#[derive(Clone, Debug, PartialEq)]
pub struct Revision {
    block_address: BlockAddress,
    metadata: Metadata,
    hash: LedgerHash,
    data: Value,
}

impl Revision {
    pub fn block_address(&self) -> &BlockAddress {
        &self.block_address
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn hash(&self) -> &LedgerHash {
        &self.hash
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn document_id(&self) -> &str {
        &self.metadata.document_id
    }
}

/// Builds [`Revision`]s from committed documents, recomputing each
/// revision's hash with the injected canonical hasher.
#[derive(Clone, Debug)]
pub struct RevisionParser<H> {
    hasher: H,
    combiner: HashCombiner,
}

impl<H: CanonicalHasher> RevisionParser<H> {
    pub fn new(hasher: H) -> Self {
        Self {
            hasher,
            combiner: HashCombiner::REFERENCE,
        }
    }

    pub fn with_ordering(mut self, ordering: HashOrdering) -> Self {
        self.combiner = HashCombiner::new(ordering);
        self
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn combiner(&self) -> &HashCombiner {
        &self.combiner
    }

    /// Revision hash: `combine(hash(metadata), hash(data))`.
    pub fn compute_hash(&self, metadata: &Value, data: &Value) -> Result<LedgerHash, LedgerError> {
        let metadata_hash = self.hasher.hash_value(metadata);
        let data_hash = self.hasher.hash_value(data);
        Ok(self
            .combiner
            .combine(metadata_hash.as_bytes(), data_hash.as_bytes())?)
    }

    /// Parse a committed document with `blockAddress`, `metadata`, `hash`,
    /// and `data` fields.
    ///
    /// Fails with [`LedgerError::MalformedRevision`] if a field is missing or
    /// has the wrong type, and with [`LedgerError::RevisionHashMismatch`] if
    /// the stored hash does not match the content.
    pub fn parse(&self, doc: &Value) -> Result<Revision, LedgerError> {
        let fields = require_struct(doc, "revision")?;
        let block_address = BlockAddress::from_value(required(fields, "blockAddress")?)?;
        let metadata_value = required(fields, "metadata")?;
        let metadata = Metadata::from_value(metadata_value)?;
        let stored = required(fields, "hash")?;
        let hash = LedgerHash::from(
            stored
                .as_blob()
                .ok_or_else(|| wrong_type("hash", "blob", stored))?,
        );
        let data = required(fields, "data")?;
        require_struct(data, "data")?;

        let expected = self.compute_hash(metadata_value, data)?;
        if expected != hash {
            warn!(
                document_id = %metadata.document_id,
                block = %block_address,
                "stored revision hash does not match content"
            );
            return Err(LedgerError::RevisionHashMismatch {
                expected: expected.to_hex(),
                actual: hash.to_hex(),
            });
        }

        debug!(
            document_id = %metadata.document_id,
            version = metadata.version,
            block = %block_address,
            "parsed revision"
        );
        Ok(Revision {
            block_address,
            metadata,
            hash,
            data: data.clone(),
        })
    }

    /// Parse a committed document from Ion text.
    pub fn parse_ion_text(&self, text: &str) -> Result<Revision, LedgerError> {
        let doc = revcheck_ion::parse(text)
            .map_err(|e| LedgerError::MalformedRevision(e.to_string()))?;
        self.parse(&doc)
    }
}

/// Parse a committed document with the reference ordering.
pub fn parse_revision<H>(doc: &Value, hasher: &H) -> Result<Revision, LedgerError>
where
    H: CanonicalHasher + ?Sized,
{
    RevisionParser::new(|value: &Value| hasher.hash_value(value)).parse(doc)
}

fn require_struct<'a>(value: &'a Value, name: &str) -> Result<&'a [(String, Value)], LedgerError> {
    value.as_struct().ok_or_else(|| wrong_type(name, "struct", value))
}

fn required<'a>(fields: &'a [(String, Value)], name: &str) -> Result<&'a Value, LedgerError> {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
        .ok_or_else(|| LedgerError::MalformedRevision(format!("missing required field {name}")))
}

fn required_str<'a>(fields: &'a [(String, Value)], name: &str) -> Result<&'a str, LedgerError> {
    let value = required(fields, name)?;
    value.as_str().ok_or_else(|| wrong_type(name, "string", value))
}

fn required_u64(fields: &[(String, Value)], name: &str) -> Result<u64, LedgerError> {
    let value = required(fields, name)?;
    let int = value.as_int().ok_or_else(|| wrong_type(name, "int", value))?;
    u64::try_from(int).map_err(|_| {
        LedgerError::MalformedRevision(format!("{name} must fit an unsigned 64-bit int, got {int}"))
    })
}

fn wrong_type(name: &str, expected: &str, found: &Value) -> LedgerError {
    LedgerError::MalformedRevision(format!(
        "{name} must be a {expected}, found {}",
        found.type_name()
    ))
}
