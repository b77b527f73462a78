//! Request options and result records of the document store.

use chrono::{DateTime, Utc};

use crate::chunk::{ChunkId, Metadata};

/// Ingestion switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Ask the embedding gateway for vectors of candidates that lack one
    pub auto_embed: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self { auto_embed: true }
    }
}

/// Outcome of one ingestion call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Ids of newly stored chunks in insertion order
    pub accepted: Vec<ChunkId>,
    /// Candidates rejected as near-duplicates
    pub deduplicated: usize,
    /// Candidates stored without an embedding because the gateway failed
    pub embedding_failures: usize,
    /// Stored chunks whose embedding could not enter the similarity index
    pub unindexed: usize,
}

/// Query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of hits
    pub k: usize,
    /// Every key must be present and match (arrays mean "any of")
    pub filter: Option<Metadata>,
    /// Overrides the configured similarity threshold
    pub min_similarity: Option<f32>,
}

impl SearchOptions {
    /// Up to `k` hits with the configured threshold and no filter
    pub const fn new(k: usize) -> Self {
        Self {
            k,
            filter: None,
            min_similarity: None,
        }
    }

    /// Restrict hits to chunks whose metadata matches `filter`
    #[must_use]
    pub fn with_filter(mut self, filter: Metadata) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Drop hits below `min_similarity`
    #[must_use]
    pub const fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Chunk id
    pub id: ChunkId,
    /// Chunk text
    pub text: String,
    /// Chunk metadata
    pub metadata: Metadata,
    /// Cosine similarity to the query
    pub similarity: f32,
}

/// Result of a flush request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// State written to disk
    Saved {
        /// Chunks in the written snapshot
        chunks: usize,
    },
    /// Nothing changed since the last successful flush
    UpToDate,
    /// No persistence directory configured
    InMemory,
}

/// Point-in-time store counters
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatistics {
    /// Stored chunks
    pub chunk_count: usize,
    /// Chunks with an embedding
    pub embedded_count: usize,
    /// Vectors in the similarity index
    pub indexed_count: usize,
    /// Fixed index dimension, once known
    pub dimension: Option<usize>,
    /// Changes not yet flushed
    pub unsaved_changes: usize,
    /// Time of the last successful flush
    pub last_persisted_at: Option<DateTime<Utc>>,
    /// Chunks held by the lookup cache
    pub cached_chunks: usize,
    /// Lookup cache hits
    pub cache_hits: u64,
    /// Lookup cache misses
    pub cache_misses: u64,
    /// Configured soft capacity
    pub max_chunks: usize,
    /// Chunks removed by cleanup and eviction since start
    pub removed_by_maintenance: u64,
}

impl IndexStatistics {
    /// Share of lookups served from the cache
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
