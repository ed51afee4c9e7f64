use revcheck_crypto::VerifyError;
use revcheck_ion::IonError;

/// Errors produced by revision parsing and document validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("malformed revision: {0}")]
    MalformedRevision(String),

    #[error("revision hash mismatch: stored {actual}, computed {expected}")]
    RevisionHashMismatch { expected: String, actual: String },

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("ion error: {0}")]
    Ion(#[from] IonError),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("ledger service error: {0}")]
    Service(String),

    #[error("configuration error: {0}")]
    Config(String),
}
