//! Document store: ingestion with deduplication, similarity search, bounded
//! growth and persistence.
//!
//! All chunk-list and index mutations happen under one lock, so concurrent
//! ingestion and search never observe a half-applied insert. Embedding requests
//! run outside the lock.

mod cache;
mod filter;
mod state;
mod types;

pub use filter::matches_filter;
pub use types::{
    AddOptions, FlushOutcome, IndexStatistics, IngestReport, SearchHit, SearchOptions,
};

use chrono::Utc;
use futures::stream::{self, StreamExt as _};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use docindex_core::{IndexConfig, Result};

use crate::chunk::{Chunk, ChunkId, ChunkSource, Metadata};
use crate::chunking::{ChunkBoundarySplitter, ChunkCandidate};
use crate::embedding::EmbeddingProvider;
use crate::persistence::PersistenceManager;
use state::{Placement, StoreState};

/// Deduplicating, searchable, persistable collection of chunks
pub struct DocumentStore<E: EmbeddingProvider> {
    state: Mutex<StoreState>,
    flush_gate: Mutex<()>,
    embedder: E,
    splitter: ChunkBoundarySplitter,
    config: IndexConfig,
    persistence: Option<PersistenceManager>,
}

impl<E: EmbeddingProvider> DocumentStore<E> {
    /// Empty store; nothing is read from disk
    ///
    /// # Errors
    /// Returns [`docindex_core::Error::Config`] if the configuration is invalid
    pub fn new(embedder: E, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(StoreState::new(config.store.lookup_cache_capacity)),
            flush_gate: Mutex::new(()),
            splitter: ChunkBoundarySplitter::from_config(&config.chunking),
            persistence: config
                .persistence
                .directory
                .as_ref()
                .map(PersistenceManager::new),
            embedder,
            config,
        })
    }

    /// Store recovered from the configured persistence directory, if any
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or persisted state
    /// exists but cannot be read
    pub async fn open(embedder: E, config: IndexConfig) -> Result<Self> {
        let mut store = Self::new(embedder, config)?;

        if let Some(persistence) = &store.persistence {
            let loaded = persistence.load().await?;
            if loaded.report.skipped > 0 {
                warn!(
                    skipped = loaded.report.skipped,
                    "recovered document index with missing records"
                );
            }
            *store.state.get_mut() = StoreState::from_parts(
                loaded.chunks,
                loaded.index,
                store.config.store.lookup_cache_capacity,
            );
        }

        Ok(store)
    }

    /// Active configuration
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Embedding gateway
    pub const fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Split and ingest one document
    pub async fn add(&self, text: &str, metadata: Metadata) -> IngestReport {
        self.add_with_options(text, metadata, AddOptions::default())
            .await
    }

    /// Split and ingest one document with explicit options
    pub async fn add_with_options(
        &self,
        text: &str,
        metadata: Metadata,
        options: AddOptions,
    ) -> IngestReport {
        let candidates = self.splitter.split(text, &metadata);
        self.add_candidates(candidates, options).await
    }

    /// Ingest a document whose metadata is derived from `source`, with `extra`
    /// entries layered on top
    pub async fn add_from_source(
        &self,
        text: &str,
        source: &ChunkSource,
        extra: Metadata,
    ) -> IngestReport {
        let mut metadata = source.to_metadata();
        metadata.extend(extra);
        self.add(text, metadata).await
    }

    /// Ingest several documents in order, embedding the whole batch concurrently
    pub async fn add_documents(
        &self,
        documents: Vec<(String, Metadata)>,
        options: AddOptions,
    ) -> IngestReport {
        let candidates = documents
            .iter()
            .flat_map(|(text, metadata)| self.splitter.split(text, metadata))
            .collect();
        self.add_candidates(candidates, options).await
    }

    /// Ingest prepared candidates.
    ///
    /// Candidates whose fingerprint is already stored are rejected up front.
    /// Survivors are embedded concurrently (bounded by
    /// `store.embed_concurrency`), then checked again under the lock against
    /// fingerprints and embeddings before being appended. A failed embedding
    /// request stores the chunk without a vector.
    pub async fn add_candidates(
        &self,
        candidates: Vec<ChunkCandidate>,
        options: AddOptions,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        if candidates.is_empty() {
            return report;
        }

        let fresh: Vec<Chunk> = {
            let state = self.state.lock().await;
            candidates
                .into_iter()
                .map(|candidate| {
                    let chunk = Chunk::new(candidate.text, candidate.metadata);
                    match candidate.embedding {
                        Some(embedding) => chunk.with_embedding(embedding),
                        None => chunk,
                    }
                })
                .filter(|chunk| {
                    let duplicate = state.contains_fingerprint(chunk.fingerprint());
                    if duplicate {
                        report.deduplicated += 1;
                    }
                    !duplicate
                })
                .collect()
        };

        let prepared: Vec<(Chunk, bool)> = stream::iter(fresh)
            .map(|chunk| self.resolve_embedding(chunk, options))
            .buffered(self.config.store.embed_concurrency.max(1))
            .collect()
            .await;

        let threshold = self.config.dedup.similarity_threshold;
        let mut state = self.state.lock().await;
        for (chunk, embedding_failed) in prepared {
            if state.has_duplicate(&chunk, threshold) {
                report.deduplicated += 1;
                continue;
            }
            if embedding_failed {
                report.embedding_failures += 1;
            }

            let id = chunk.id().clone();
            if state.insert(chunk) == Placement::Unindexed {
                report.unindexed += 1;
            }
            report.accepted.push(id);
        }
        let should_flush = state.unsaved_changes() > self.config.store.save_after_changes;
        drop(state);

        debug!(
            accepted = report.accepted.len(),
            deduplicated = report.deduplicated,
            embedding_failures = report.embedding_failures,
            unindexed = report.unindexed,
            "ingested chunks"
        );

        if should_flush && let Err(flush_error) = self.flush().await {
            error!(error = %flush_error, "automatic flush failed, changes kept in memory");
        }

        report
    }

    async fn resolve_embedding(&self, mut chunk: Chunk, options: AddOptions) -> (Chunk, bool) {
        if !options.auto_embed || chunk.embedding().is_some() {
            return (chunk, false);
        }

        match self.embedder.embed(chunk.text()).await {
            Ok(embedding) => {
                chunk.set_embedding(Some(embedding));
                (chunk, false)
            }
            Err(embed_error) => {
                warn!(chunk_id = %chunk.id(), error = %embed_error, "embedding failed, storing chunk without a vector");
                (chunk, true)
            }
        }
    }

    /// Top matches for `query`, best first.
    ///
    /// Asks the index for `k * overfetch_factor` neighbors, drops those failing
    /// the metadata filter or scoring below the threshold, and returns at most
    /// `k` hits. Equal similarities keep insertion order. Returned chunks have
    /// their access time bumped.
    ///
    /// # Errors
    /// Returns [`docindex_core::Error::EmbeddingFailure`] if the query cannot be
    /// embedded, or [`docindex_core::Error::DimensionMismatch`] if the query
    /// vector's length differs from the index dimension
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        if options.k == 0 {
            return Ok(Vec::new());
        }

        let min_similarity = options
            .min_similarity
            .unwrap_or(self.config.search.min_similarity);
        let query_embedding = self.embedder.embed(query).await?;

        let mut state = self.state.lock().await;
        if state.len() == 0 {
            return Ok(Vec::new());
        }

        let fetch = options
            .k
            .saturating_mul(self.config.search.overfetch_factor)
            .min(state.len());
        let mut ranked = state.ranked_candidates(&query_embedding, fetch)?;
        ranked.retain(|(position, similarity)| {
            *similarity >= min_similarity
                && options.filter.as_ref().is_none_or(|filter| {
                    matches_filter(state.chunk_at(*position).metadata(), filter)
                })
        });
        ranked.sort_by(|first, second| {
            second
                .1
                .partial_cmp(&first.1)
                .unwrap_or(Ordering::Equal)
                .then(first.0.cmp(&second.0))
        });
        ranked.truncate(options.k);

        let positions: Vec<usize> = ranked.iter().map(|(position, _)| *position).collect();
        state.touch(&positions, Utc::now());

        let hits = ranked
            .into_iter()
            .map(|(position, similarity)| {
                let chunk = state.chunk_at(position);
                SearchHit {
                    id: chunk.id().clone(),
                    text: chunk.text().to_owned(),
                    metadata: chunk.metadata().clone(),
                    similarity,
                }
            })
            .collect();
        drop(state);

        Ok(hits)
    }

    /// Search with the configured default `k` and threshold
    ///
    /// # Errors
    /// See [`DocumentStore::search`]
    pub async fn search_default(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.search(query, &SearchOptions::new(self.config.search.default_k))
            .await
    }

    /// Chunk by id, served through the lookup cache; bumps its access time
    pub async fn get(&self, id: &ChunkId) -> Option<Chunk> {
        self.state.lock().await.get(id, Utc::now())
    }

    /// Remove one chunk; returns whether it existed
    pub async fn remove(&self, id: &ChunkId) -> bool {
        self.state
            .lock()
            .await
            .remove_where(|chunk| chunk.id() == id)
            > 0
    }

    /// Remove chunks not accessed within `max_age`; returns how many were removed
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let removed = self.state.lock().await.cleanup(max_age, Utc::now());
        if removed > 0 {
            info!(removed, "cleaned up stale chunks");
        }
        removed
    }

    /// Drop every chunk and reset the index dimension
    pub async fn clear(&self) {
        self.state.lock().await.clear();
        info!("cleared document store");
    }

    /// Run maintenance and write the store to the persistence directory.
    ///
    /// Flushes are serialized; a flush queued behind another one that already
    /// wrote every change returns [`FlushOutcome::UpToDate`]. Without a
    /// persistence directory only maintenance runs.
    ///
    /// # Errors
    /// Returns [`docindex_core::Error::PersistenceIo`] if writing fails; the
    /// in-memory state and its unsaved-change count are kept
    pub async fn flush(&self) -> Result<FlushOutcome> {
        let _flushing = self.flush_gate.lock().await;

        let mut state = self.state.lock().await;
        let maintained = state.run_maintenance(&self.config.store, Utc::now());
        if maintained > 0 {
            info!(removed = maintained, "maintenance trimmed document store");
        }

        let Some(persistence) = &self.persistence else {
            let captured = state.pending();
            state.mark_persisted(captured, None);
            return Ok(FlushOutcome::InMemory);
        };
        if state.is_persisted() {
            debug!("flush skipped, nothing changed since the last save");
            return Ok(FlushOutcome::UpToDate);
        }

        let captured = state.pending();
        let snapshot = state.snapshot();
        drop(state);

        let chunks = persistence.save(snapshot).await?;
        self.state
            .lock()
            .await
            .mark_persisted(captured, Some(Utc::now()));

        Ok(FlushOutcome::Saved { chunks })
    }

    /// Current counters
    pub async fn statistics(&self) -> IndexStatistics {
        self.state
            .lock()
            .await
            .statistics(self.config.store.max_chunks)
    }

    /// Chunk counts per `source` metadata value
    pub async fn source_counts(&self) -> BTreeMap<String, usize> {
        self.state.lock().await.source_counts()
    }

    /// Number of stored chunks
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Whether the store holds no chunks
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
