//! Semantic document index: chunking, embedding, similarity search, persistence
//! and background re-indexing of a directory tree.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::assertions_on_result_states,
        clippy::panic,
        clippy::shadow_unrelated,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

/// Stored chunks, their ids, fingerprints and provenance
pub mod chunk;
/// Splitting text into overlapping windows at natural boundaries
pub mod chunking;
pub mod embedding;
/// Exact nearest-neighbour index over unit vectors
pub mod index;
pub mod indexer;
/// Durable snapshots of the store
pub mod persistence;
pub mod store;
#[cfg(test)]
mod test_util;

pub use chunk::{Chunk, ChunkId, ChunkSource, Fingerprint, Metadata};
pub use chunking::{ChunkBoundarySplitter, ChunkCandidate, ChunkSpan};
pub use docindex_core::{Error, IndexConfig, Result};
pub use embedding::{Embedding, EmbeddingProvider, OllamaEmbeddingClient};
pub use index::{IndexSnapshot, SimilarityIndex};
pub use indexer::{CycleReport, IncrementalIndexer, IndexerHandle};
pub use persistence::{LoadReport, PersistenceManager};
pub use store::{
    AddOptions, DocumentStore, FlushOutcome, IndexStatistics, IngestReport, SearchHit,
    SearchOptions,
};
