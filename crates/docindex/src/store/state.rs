//! Mutable store state guarded by the document store's lock.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

use docindex_core::{Result, StoreConfig};

use super::cache::LookupCache;
use super::types::IndexStatistics;
use crate::chunk::{Chunk, ChunkId, Fingerprint, is_near_duplicate};
use crate::index::{SimilarityIndex, UnitVector, cosine_similarity, similarity_from_distance};
use crate::persistence::{ChunkRecord, StoreSnapshot};

/// Where an inserted chunk ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Stored and indexed
    Indexed,
    /// Stored with an embedding the index rejected
    Unindexed,
    /// Stored without an embedding
    NotEmbedded,
}

/// Unsaved work captured alongside a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingChanges {
    changes: usize,
    access_generation: u64,
}

/// Chunks, their index and bookkeeping
#[derive(Debug)]
pub struct StoreState {
    chunks: Vec<Chunk>,
    positions: HashMap<ChunkId, usize>,
    index: SimilarityIndex,
    cache: LookupCache,
    unsaved_changes: usize,
    /// Bumped whenever a read moves an access time
    access_generation: u64,
    persisted_access_generation: u64,
    last_persisted_at: Option<DateTime<Utc>>,
    removed_by_maintenance: u64,
}

impl StoreState {
    /// Empty state
    pub fn new(cache_capacity: usize) -> Self {
        Self::from_parts(Vec::new(), SimilarityIndex::default(), cache_capacity)
    }

    /// State recovered from persisted chunks and index
    pub fn from_parts(chunks: Vec<Chunk>, index: SimilarityIndex, cache_capacity: usize) -> Self {
        let mut state = Self {
            chunks,
            positions: HashMap::new(),
            index,
            cache: LookupCache::new(cache_capacity),
            unsaved_changes: 0,
            access_generation: 0,
            persisted_access_generation: 0,
            last_persisted_at: None,
            removed_by_maintenance: 0,
        };
        state.rebuild_positions();
        state
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub const fn unsaved_changes(&self) -> usize {
        self.unsaved_changes
    }

    /// Unsaved work as of now, to be handed back to [`StoreState::mark_persisted`]
    pub const fn pending(&self) -> PendingChanges {
        PendingChanges {
            changes: self.unsaved_changes,
            access_generation: self.access_generation,
        }
    }

    /// Whether a stored chunk has this fingerprint
    pub fn contains_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.chunks
            .iter()
            .any(|chunk| chunk.fingerprint() == fingerprint)
    }

    /// Whether `candidate` duplicates any stored chunk
    pub fn has_duplicate(&self, candidate: &Chunk, threshold: f32) -> bool {
        self.chunks.iter().any(|chunk| {
            is_near_duplicate(
                candidate.fingerprint(),
                candidate.embedding(),
                chunk.fingerprint(),
                chunk.embedding(),
                threshold,
            )
        })
    }

    /// Append a chunk, indexing its embedding when it has one
    pub fn insert(&mut self, chunk: Chunk) -> Placement {
        let placement = match chunk.embedding() {
            None => Placement::NotEmbedded,
            Some(embedding) => match self.index.add(chunk.id().clone(), embedding) {
                Ok(()) => Placement::Indexed,
                Err(error) => {
                    warn!(chunk_id = %chunk.id(), %error, "chunk stored without index entry");
                    Placement::Unindexed
                }
            },
        };

        self.positions.insert(chunk.id().clone(), self.chunks.len());
        self.chunks.push(chunk);
        self.unsaved_changes += 1;
        placement
    }

    /// Candidate positions with their similarity to `query`, best first.
    ///
    /// Uses the index (asking for `fetch` neighbors) when it has entries,
    /// otherwise scans every chunk with an embedding of matching length.
    pub fn ranked_candidates(&self, query: &[f32], fetch: usize) -> Result<Vec<(usize, f32)>> {
        let query = UnitVector::new(query)?;

        if !self.index.is_empty() {
            let neighbors = self.index.search(query.as_slice(), fetch)?;
            return Ok(neighbors
                .into_iter()
                .filter_map(|neighbor| {
                    self.positions
                        .get(&neighbor.label)
                        .map(|position| (*position, similarity_from_distance(neighbor.distance)))
                })
                .collect());
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(position, chunk)| {
                chunk
                    .embedding()
                    .filter(|embedding| embedding.len() == query.len())
                    .map(|embedding| (position, cosine_similarity(query.as_slice(), embedding)))
            })
            .collect();
        scored.sort_by(|first, second| second.1.partial_cmp(&first.1).unwrap_or(Ordering::Equal));
        Ok(scored)
    }

    pub fn chunk_at(&self, position: usize) -> &Chunk {
        &self.chunks[position]
    }

    /// Bump access time of the chunks at `positions`
    ///
    /// Access times are saved by the next flush but do not count towards the
    /// automatic flush threshold.
    pub fn touch(&mut self, positions: &[usize], now: DateTime<Utc>) {
        for position in positions {
            if let Some(chunk) = self.chunks.get_mut(*position) {
                chunk.touch_at(now);
                self.cache.touch(chunk.id(), now);
                self.access_generation += 1;
            }
        }
    }

    /// Look up a chunk through the cache, bumping its access time
    pub fn get(&mut self, id: &ChunkId, now: DateTime<Utc>) -> Option<Chunk> {
        let position = *self.positions.get(id)?;
        self.chunks[position].touch_at(now);
        self.access_generation += 1;

        if let Some(cached) = self.cache.get(id, now) {
            return Some(cached);
        }

        let chunk = self.chunks[position].clone();
        self.cache.put(chunk.clone());
        Some(chunk)
    }

    /// Remove every chunk matching `predicate` from the list, index and cache
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Chunk) -> bool) -> usize {
        let (removed, kept): (Vec<Chunk>, Vec<Chunk>) =
            self.chunks.drain(..).partition(|chunk| predicate(chunk));
        self.chunks = kept;
        if removed.is_empty() {
            return 0;
        }

        let removed_ids: HashSet<&ChunkId> = removed.iter().map(Chunk::id).collect();
        self.index.retain(|label| !removed_ids.contains(&label));
        for id in &removed_ids {
            self.cache.invalidate(id);
        }

        self.rebuild_positions();
        self.unsaved_changes += removed.len();
        removed.len()
    }

    /// Remove chunks not accessed since `now - max_age`
    pub fn cleanup(&mut self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
        else {
            return 0;
        };

        let removed = self.remove_where(|chunk| chunk.last_accessed_at() < cutoff);
        if removed > 0 {
            debug!(removed, %cutoff, "removed stale chunks");
        }
        self.removed_by_maintenance += removed as u64;
        removed
    }

    /// Remove least recently accessed chunks until at most `target_len` remain
    pub fn evict_least_recently_used(&mut self, target_len: usize) -> usize {
        let excess = self.chunks.len().saturating_sub(target_len);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(DateTime<Utc>, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| (chunk.last_accessed_at(), position))
            .collect();
        by_age.sort_unstable();

        let evicted: HashSet<ChunkId> = by_age
            .into_iter()
            .take(excess)
            .map(|(_, position)| self.chunks[position].id().clone())
            .collect();

        let removed = self.remove_where(|chunk| evicted.contains(chunk.id()));
        debug!(removed, target_len, "evicted least recently used chunks");
        self.removed_by_maintenance += removed as u64;
        removed
    }

    /// Cleanup, then eviction, once the store has grown past the configured threshold
    pub fn run_maintenance(&mut self, config: &StoreConfig, now: DateTime<Utc>) -> usize {
        let threshold = config.cleanup_threshold();
        if self.chunks.len() <= threshold {
            return 0;
        }

        let stale = self.cleanup(config.max_age(), now);
        let evicted = self.evict_least_recently_used(threshold);
        stale + evicted
    }

    /// Drop all chunks and reset the index dimension
    pub fn clear(&mut self) {
        let removed = self.chunks.len();
        self.chunks.clear();
        self.positions.clear();
        self.index.reset();
        self.cache.clear();
        self.unsaved_changes += removed.max(1);
    }

    /// Serializable copy of the current state
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            records: self.chunks.iter().map(ChunkRecord::from).collect(),
            index: self.index.snapshot(),
        }
    }

    /// Whether the state on disk is current
    pub const fn is_persisted(&self) -> bool {
        self.unsaved_changes == 0
            && self.access_generation == self.persisted_access_generation
            && self.last_persisted_at.is_some()
    }

    /// Record a successful flush of a snapshot taken when `captured` was pending
    pub fn mark_persisted(&mut self, captured: PendingChanges, at: Option<DateTime<Utc>>) {
        self.unsaved_changes = self.unsaved_changes.saturating_sub(captured.changes);
        self.persisted_access_generation = self
            .persisted_access_generation
            .max(captured.access_generation);
        if at.is_some() {
            self.last_persisted_at = at;
        }
    }

    pub fn statistics(&self, max_chunks: usize) -> IndexStatistics {
        IndexStatistics {
            chunk_count: self.chunks.len(),
            embedded_count: self
                .chunks
                .iter()
                .filter(|chunk| chunk.embedding().is_some())
                .count(),
            indexed_count: self.index.len(),
            dimension: self.index.dimension(),
            unsaved_changes: self.unsaved_changes,
            last_persisted_at: self.last_persisted_at,
            cached_chunks: self.cache.len(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            max_chunks,
            removed_by_maintenance: self.removed_by_maintenance,
        }
    }

    /// Chunk counts grouped by the `source` metadata value
    pub fn source_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for chunk in &self.chunks {
            let source = match chunk.metadata().get("source") {
                Some(Value::String(source)) => source.clone(),
                Some(other) => other.to_string(),
                None => "unknown".to_owned(),
            };
            *counts.entry(source).or_insert(0) += 1;
        }
        counts
    }

    fn rebuild_positions(&mut self) {
        self.positions = self
            .chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| (chunk.id().clone(), position))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Metadata;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(text.to_owned(), Metadata::new())
    }

    fn embedded(text: &str, embedding: &[f32]) -> Chunk {
        chunk(text).with_embedding(embedding.to_vec())
    }

    #[test]
    fn test_insert_placements() {
        let mut state = StoreState::new(8);
        assert_eq!(state.insert(embedded("a", &[1.0, 0.0])), Placement::Indexed);
        assert_eq!(state.insert(embedded("b", &[1.0, 0.0, 0.0])), Placement::Unindexed);
        assert_eq!(state.insert(chunk("c")), Placement::NotEmbedded);
        assert_eq!(state.insert(embedded("d", &[0.0, 0.0])), Placement::Unindexed);

        assert_eq!(state.len(), 4);
        assert_eq!(state.statistics(10).indexed_count, 1);
        assert_eq!(state.unsaved_changes(), 4);
    }

    #[test]
    fn test_duplicate_detection() {
        let mut state = StoreState::new(8);
        state.insert(embedded("Kup mleko!", &[1.0, 0.0]));

        assert!(state.contains_fingerprint(&Fingerprint::of("kup mleko")));
        assert!(state.has_duplicate(&chunk("KUP MLEKO"), 0.8));
        assert!(state.has_duplicate(&embedded("other", &[0.99, 0.05]), 0.8));
        assert!(!state.has_duplicate(&embedded("other", &[0.0, 1.0]), 0.8));
    }

    #[test]
    fn test_scan_fallback_when_index_empty() {
        let mut state = StoreState::new(8);
        state.insert(embedded("zero", &[0.0, 0.0]));
        state.insert(chunk("plain"));

        let ranked = state.ranked_candidates(&[1.0, 0.0], 10).unwrap();
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].1.abs() < f32::EPSILON);
    }

    #[test]
    fn test_remove_keeps_positions_consistent() {
        let mut state = StoreState::new(8);
        let first = embedded("first", &[1.0, 0.0]);
        let second = embedded("second", &[0.0, 1.0]);
        let third = embedded("third", &[1.0, 1.0]);
        let first_id = first.id().clone();
        let third_id = third.id().clone();
        state.insert(first);
        state.insert(second);
        state.insert(third);

        assert_eq!(state.remove_where(|chunk| chunk.id() == &first_id), 1);
        assert!(state.get(&first_id, Utc::now()).is_none());
        assert_eq!(state.get(&third_id, Utc::now()).map(|chunk| chunk.text().to_owned()), Some("third".to_owned()));
        assert_eq!(state.statistics(10).indexed_count, 2);

        let ranked = state.ranked_candidates(&[1.0, 1.0], 2).unwrap();
        assert_eq!(state.chunk_at(ranked[0].0).id(), &third_id);
    }

    #[test]
    fn test_cleanup_removes_only_stale_chunks() {
        let mut state = StoreState::new(8);
        let now = Utc::now();
        state.insert(chunk("fresh"));
        state.insert(chunk("stale"));
        state.chunks[1] = Chunk::restore(
            state.chunks[1].id().clone(),
            "stale".to_owned(),
            Metadata::new(),
            Fingerprint::of("stale"),
            now - TimeDelta::days(30),
            now - TimeDelta::days(30),
        );

        let removed = state.cleanup(Duration::from_secs(7 * 24 * 60 * 60), now);
        assert_eq!(removed, 1);
        assert_eq!(state.len(), 1);
        assert_eq!(state.chunk_at(0).text(), "fresh");
    }

    #[test]
    fn test_eviction_prefers_least_recently_accessed() {
        let mut state = StoreState::new(8);
        let now = Utc::now();
        for text in ["a", "b", "c", "d"] {
            state.insert(chunk(text));
        }
        state.touch(&[0, 2], now + TimeDelta::seconds(10));

        let removed = state.evict_least_recently_used(2);
        assert_eq!(removed, 2);
        let remaining: Vec<&str> = (0..state.len()).map(|position| state.chunk_at(position).text()).collect();
        assert_eq!(remaining, vec!["a", "c"]);
    }

    #[test]
    fn test_maintenance_respects_threshold() {
        let config = StoreConfig {
            max_chunks: 5,
            cleanup_fraction: 0.6,
            ..StoreConfig::default()
        };
        let mut state = StoreState::new(8);
        for text in ["a", "b", "c"] {
            state.insert(chunk(text));
        }
        assert_eq!(state.run_maintenance(&config, Utc::now()), 0);

        state.insert(chunk("d"));
        state.insert(chunk("e"));
        assert_eq!(state.run_maintenance(&config, Utc::now()), 2);
        assert_eq!(state.len(), 3);
        assert_eq!(state.statistics(5).removed_by_maintenance, 2);
    }

    #[test]
    fn test_cache_counts_hits() {
        let mut state = StoreState::new(8);
        let stored = chunk("cached");
        let id = stored.id().clone();
        state.insert(stored);

        state.get(&id, Utc::now());
        state.get(&id, Utc::now());
        let statistics = state.statistics(10);
        assert_eq!((statistics.cache_hits, statistics.cache_misses), (1, 1));
    }

    #[test]
    fn test_clear_resets_dimension() {
        let mut state = StoreState::new(8);
        state.insert(embedded("a", &[1.0, 0.0]));
        state.clear();
        assert_eq!(state.len(), 0);
        assert_eq!(state.statistics(10).dimension, None);
        assert_eq!(state.insert(embedded("b", &[1.0, 0.0, 0.0])), Placement::Indexed);
    }

    #[test]
    fn test_source_counts() {
        let mut state = StoreState::new(8);
        let mut metadata = Metadata::new();
        metadata.insert("source".to_owned(), Value::from("a.md"));
        state.insert(Chunk::new("one".to_owned(), metadata.clone()));
        state.insert(Chunk::new("two".to_owned(), metadata));
        state.insert(chunk("three"));

        let counts = state.source_counts();
        assert_eq!(counts["a.md"], 2);
        assert_eq!(counts["unknown"], 1);
    }
}
