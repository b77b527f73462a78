//! On-disk chunk record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkId, Fingerprint, Metadata};

/// One entry of the persisted chunk list.
///
/// Embeddings are not stored here; they live in the index artifact and are
/// reattached by label on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk id
    pub chunk_id: ChunkId,
    /// Chunk text
    pub text: String,
    /// Chunk metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Content fingerprint, recomputed from the text when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_hash: Option<Fingerprint>,
    /// Last read access, defaults to `created_at` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl From<&Chunk> for ChunkRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.id().clone(),
            text: chunk.text().to_owned(),
            metadata: chunk.metadata().clone(),
            created_at: chunk.created_at(),
            text_hash: Some(chunk.fingerprint().clone()),
            last_accessed_at: Some(chunk.last_accessed_at()),
        }
    }
}

impl ChunkRecord {
    /// Rebuild the chunk, without an embedding
    pub fn into_chunk(self) -> Chunk {
        let fingerprint = self
            .text_hash
            .unwrap_or_else(|| Fingerprint::of(&self.text));
        let last_accessed_at = self.last_accessed_at.unwrap_or(self.created_at);
        Chunk::restore(
            self.chunk_id,
            self.text,
            self.metadata,
            fingerprint,
            self.created_at,
            last_accessed_at,
        )
    }
}
