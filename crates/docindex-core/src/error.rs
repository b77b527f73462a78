use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for index operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while ingesting, searching or persisting the index.
#[derive(Debug, Error)]
pub enum Error {
    /// File system access failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Chunk records could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),

    /// A configuration file is not valid TOML.
    #[error("TOML error: {0}")]
    Toml(#[from] TomlError),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The embedding gateway could not vectorize a text.
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// A vector's length disagrees with the fixed index dimension.
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the first inserted vector.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// A vector cannot be L2-normalized (empty, zero norm or non-finite).
    #[error("Degenerate vector: {0}")]
    DegenerateVector(String),

    /// Saving or loading persisted state did not complete.
    #[error("Persistence failed: {0}")]
    PersistenceIo(String),

    /// Persisted state exists but could not be decoded.
    #[error("Malformed persisted state: {0}")]
    MalformedPersistedState(String),

    /// A chunk source failed validation at construction.
    #[error("Invalid chunk source: {0}")]
    InvalidSource(String),

    /// Anything else, such as a failed background task.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether repeating the operation may succeed (gateway and disk failures).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingFailure(_) | Self::PersistenceIo(_) | Self::Io(_)
        )
    }
}
