use chrono::SecondsFormat;
use revcheck_types::{LedgerHash, Value};
use sha2::{Digest, Sha256};

/// Structural hash of a document value.
///
/// The ledger computes revision hashes with its own canonical scheme over
/// the revision's metadata and data. Callers inject an implementation of
/// that scheme wherever revision hashes are recomputed; there is no global
/// default. Any `Fn(&Value) -> LedgerHash` is a `CanonicalHasher`.
pub trait CanonicalHasher {
    fn hash_value(&self, value: &Value) -> LedgerHash;
}

impl<F> CanonicalHasher for F
where
    F: Fn(&Value) -> LedgerHash,
{
    fn hash_value(&self, value: &Value) -> LedgerHash {
        self(value)
    }
}

/// Deterministic SHA-256 structural hash.
///
/// Every node is hashed as `tag || u64 length || payload`; containers hash
/// the digests of their children, and struct field digests are sorted so
/// field order does not matter while list order does. This is not the
/// ledger service's own scheme: use it for self-hosted data and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StructuralSha256;

const TAG_NULL: u8 = 0x0f;
const TAG_BOOL: u8 = 0x10;
const TAG_INT: u8 = 0x20;
const TAG_FLOAT: u8 = 0x40;
const TAG_DECIMAL: u8 = 0x50;
const TAG_TIMESTAMP: u8 = 0x60;
const TAG_SYMBOL: u8 = 0x70;
const TAG_STRING: u8 = 0x80;
const TAG_BLOB: u8 = 0xa0;
const TAG_LIST: u8 = 0xb0;
const TAG_STRUCT: u8 = 0xd0;
const TAG_FIELD: u8 = 0xd1;

impl CanonicalHasher for StructuralSha256 {
    fn hash_value(&self, value: &Value) -> LedgerHash {
        LedgerHash::from(digest_value(value))
    }
}

fn digest_value(value: &Value) -> [u8; 32] {
    match value {
        Value::Null => tagged(TAG_NULL, &[]),
        Value::Bool(b) => tagged(TAG_BOOL, &[u8::from(*b)]),
        Value::Int(i) => tagged(TAG_INT, &i.to_be_bytes()),
        Value::Float(f) => tagged(TAG_FLOAT, &f.to_bits().to_be_bytes()),
        Value::Decimal(text) => tagged(TAG_DECIMAL, text.as_bytes()),
        Value::Timestamp(ts) => tagged(
            TAG_TIMESTAMP,
            ts.to_rfc3339_opts(SecondsFormat::AutoSi, true).as_bytes(),
        ),
        Value::Symbol(s) => tagged(TAG_SYMBOL, s.as_bytes()),
        Value::String(s) => tagged(TAG_STRING, s.as_bytes()),
        Value::Blob(bytes) => tagged(TAG_BLOB, bytes),
        Value::List(items) => {
            let children: Vec<u8> = items.iter().flat_map(digest_value).collect();
            tagged(TAG_LIST, &children)
        }
        Value::Struct(fields) => {
            let mut field_digests: Vec<[u8; 32]> = fields
                .iter()
                .map(|(name, item)| {
                    let mut payload = digest_value(&Value::Symbol(name.clone())).to_vec();
                    payload.extend_from_slice(&digest_value(item));
                    tagged(TAG_FIELD, &payload)
                })
                .collect();
            field_digests.sort_unstable();
            tagged(TAG_STRUCT, &field_digests.concat())
        }
    }
}

fn tagged(tag: u8, payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([tag]);
    hasher.update((payload.len() as u64).to_be_bytes());
    hasher.update(payload);
    hasher.finalize().into()
}
