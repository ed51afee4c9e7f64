//! Foundation types for revcheck.
//!
//! Every other revcheck crate depends on `revcheck-types`.
//!
//! # Key Types
//!
//! - [`LedgerHash`] - Hash bytes as published by the ledger (SHA-256, or empty)
//! - [`Value`] - Structured document value (the shape of ledger query results)

pub mod error;
pub mod hash;
pub mod value;

pub use error::TypeError;
pub use hash::LedgerHash;
pub use value::Value;
