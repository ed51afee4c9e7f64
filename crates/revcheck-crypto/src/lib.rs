//! Revision integrity verification primitives.
//!
//! Provides the order-normalizing SHA-256 hash combiner, audit proof
//! decoding and root reconstruction, digest verification, the canonical
//! hasher seam used to recompute revision hashes, a proof tree builder, and a
//! bit-flip mutator for negative fixtures.
//!
//! Every function here is pure: no I/O, no shared state.

pub mod canonical;
pub mod combine;
pub mod error;
pub mod mutate;
pub mod proof;
pub mod tree;
pub mod verifier;

pub use canonical::{CanonicalHasher, StructuralSha256};
pub use combine::{combine, HashCombiner, HashOrdering};
pub use error::{VerifyError, VerifyResult};
pub use mutate::{flip_bit_with, flip_random_bit};
pub use proof::{reconstruct_root, Proof};
pub use tree::ProofTree;
pub use verifier::{verify, Verifier};
