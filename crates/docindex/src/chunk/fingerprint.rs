//! Normalized-content fingerprints for cheap duplicate detection.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// SHA-256 of the normalized text, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint `text` after normalization
    pub fn of(text: &str) -> Self {
        let normalized = normalize_content(text);
        let digest = Sha256::digest(normalized.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(&self.0)
    }
}

/// Lowercase, drop punctuation and collapse whitespace runs to single spaces.
///
/// Word characters (alphanumerics and `_`) survive; everything else that is not
/// whitespace is removed without leaving a gap, so `"co-op"` becomes `"coop"`.
pub fn normalize_content(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|character| {
            character.is_alphanumeric() || *character == '_' || character.is_whitespace()
        })
        .flat_map(char::to_lowercase)
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
