//! Ledger revisions and document validation against published digests.
//!
//! This crate provides:
//! - `Revision`, `Metadata`, and `BlockAddress` with a self-checking parser
//!   that recomputes each revision's hash from its content
//! - The `LedgerReader` boundary to the ledger service
//! - `InMemoryLedger` implementation for tests and embedding
//! - `DocumentValidator`, which checks every revision a query returns against
//!   the ledger digest
//! - `VerifierConfig`, loaded from TOML

pub mod config;
pub mod error;
pub mod memory;
pub mod revision;
pub mod traits;
pub mod validation;

pub use config::VerifierConfig;
pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use revision::{parse_revision, BlockAddress, Metadata, Revision, RevisionParser};
pub use traits::{LedgerDigest, LedgerReader};
pub use validation::{DocumentValidator, RevisionOutcome, ValidationReport};
