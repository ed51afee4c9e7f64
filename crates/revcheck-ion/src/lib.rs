//! Ion text support for revcheck.
//!
//! The ledger service speaks Ion: query rows, block addresses, and audit
//! proofs all arrive as Ion text. This crate reads that text into
//! [`revcheck_types::Value`] and writes values back out.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{IonError, IonResult};
pub use reader::{parse, parse_all, parse_list, parse_struct};
pub use writer::{to_text, write_value};
