use std::path::Path;

use revcheck_crypto::{HashOrdering, Verifier};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Verification settings, usually loaded from a TOML file.
///
/// ```toml
/// hash_ordering = "reference"
/// fail_fast = false
/// max_proof_length = 256
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Comparator used when combining hash pairs. Must match the publisher.
    pub hash_ordering: HashOrdering,
    /// Stop validation at the first revision whose proof fails.
    pub fail_fast: bool,
    pub max_proof_length: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            hash_ordering: HashOrdering::Reference,
            fail_fast: false,
            max_proof_length: Verifier::DEFAULT_MAX_PROOF_LENGTH,
        }
    }
}

impl VerifierConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, LedgerError> {
        toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, LedgerError> {
        toml::to_string(self).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Proof verifier with this configuration's ordering and limits.
    pub fn verifier(&self) -> Verifier {
        Verifier::new(self.hash_ordering).with_max_proof_length(self.max_proof_length)
    }
}
