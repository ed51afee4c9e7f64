/// Errors from hash combination and proof verification.
///
/// A proof that is well formed but does not reproduce the digest is not an
/// error; see [`crate::Verifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid hash length: expected 0 or {expected} bytes, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("cannot flip a bit of an empty input")]
    EmptyInput,
}

pub type VerifyResult<T> = Result<T, VerifyError>;
