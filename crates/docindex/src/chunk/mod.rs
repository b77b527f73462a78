//! Chunk value type with its identity, metadata and content fingerprint.

mod fingerprint;
mod source;

pub use fingerprint::{Fingerprint, normalize_content};
pub use source::ChunkSource;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use crate::index::cosine_similarity;

/// Ordered key/value metadata attached to a chunk (document id, source, offsets, tags).
pub type Metadata = BTreeMap<String, Value>;

/// Unique chunk identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ChunkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ChunkId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Display for ChunkId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(&self.0)
    }
}

/// A contiguous, bounded span of a document stored as one retrievable unit.
///
/// The fingerprint is derived from the text at construction and never
/// recomputed, so the text is not mutable after creation. The only mutation a
/// stored chunk sees is [`Chunk::touch_at`] bumping its access time on read.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    id: ChunkId,
    text: String,
    metadata: Metadata,
    embedding: Option<Vec<f32>>,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    fingerprint: Fingerprint,
}

impl Chunk {
    /// Create a chunk with a fresh id, computing its fingerprint
    pub fn new(text: String, metadata: Metadata) -> Self {
        let now = Utc::now();
        let fingerprint = Fingerprint::of(&text);
        Self {
            id: ChunkId::generate(),
            text,
            metadata,
            embedding: None,
            created_at: now,
            last_accessed_at: now,
            fingerprint,
        }
    }

    /// Rebuild a chunk from persisted fields
    pub fn restore(
        id: ChunkId,
        text: String,
        metadata: Metadata,
        fingerprint: Fingerprint,
        created_at: DateTime<Utc>,
        last_accessed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            text,
            metadata,
            embedding: None,
            created_at,
            last_accessed_at,
            fingerprint,
        }
    }

    /// Attach an embedding
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Replace or clear the embedding
    pub fn set_embedding(&mut self, embedding: Option<Vec<f32>>) {
        self.embedding = embedding;
    }

    /// Record a read access at `at`; access time never moves backwards
    pub fn touch_at(&mut self, at: DateTime<Utc>) {
        if at > self.last_accessed_at {
            self.last_accessed_at = at;
        }
    }

    /// Chunk identifier
    pub fn id(&self) -> &ChunkId {
        &self.id
    }

    /// Chunk text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Chunk metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Embedding, if one was obtained
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Creation time
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the most recent read
    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    /// Normalized-content fingerprint
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Check whether `other` is a near-duplicate of this chunk.
    ///
    /// Equal fingerprints always match. When both chunks carry embeddings of
    /// the same length, cosine similarity strictly above `threshold` matches.
    pub fn is_similar_to(&self, other: &Self, threshold: f32) -> bool {
        is_near_duplicate(
            &self.fingerprint,
            self.embedding(),
            &other.fingerprint,
            other.embedding(),
            threshold,
        )
    }
}

/// Near-duplicate test shared by chunks and not-yet-stored candidates.
pub fn is_near_duplicate(
    fingerprint: &Fingerprint,
    embedding: Option<&[f32]>,
    other_fingerprint: &Fingerprint,
    other_embedding: Option<&[f32]>,
    threshold: f32,
) -> bool {
    if fingerprint == other_fingerprint {
        return true;
    }

    match (embedding, other_embedding) {
        (Some(left), Some(right)) if left.len() == right.len() => {
            cosine_similarity(left, right) > threshold
        }
        _ => false,
    }
}
