//! Bounded chunk lookup cache with hit/miss counters.

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;

use crate::chunk::{Chunk, ChunkId};

/// Memo of recently looked-up chunks; never the source of truth.
///
/// Capacity 0 disables caching while still counting misses.
#[derive(Debug)]
pub struct LookupCache {
    entries: Option<LruCache<ChunkId, Chunk>>,
    hits: u64,
    misses: u64,
}

impl LookupCache {
    /// Cache holding at most `capacity` chunks
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached copy of `id`, touched at `now`; counts a hit or a miss
    pub fn get(&mut self, id: &ChunkId, now: DateTime<Utc>) -> Option<Chunk> {
        let found = self.entries.as_mut().and_then(|entries| entries.get_mut(id));
        if let Some(chunk) = found {
            chunk.touch_at(now);
            self.hits += 1;
            Some(chunk.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    /// Remember `chunk`, evicting the least recently used entry when full
    pub fn put(&mut self, chunk: Chunk) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(chunk.id().clone(), chunk);
        }
    }

    /// Bump the access time of a cached copy without affecting recency or counters
    pub fn touch(&mut self, id: &ChunkId, now: DateTime<Utc>) {
        if let Some(chunk) = self.entries.as_mut().and_then(|entries| entries.peek_mut(id)) {
            chunk.touch_at(now);
        }
    }

    /// Forget `id`
    pub fn invalidate(&mut self, id: &ChunkId) {
        if let Some(entries) = self.entries.as_mut() {
            entries.pop(id);
        }
    }

    /// Forget everything; counters survive
    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    /// Cached entries
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    /// Lookups served from the cache
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that fell through to the store
    pub const fn misses(&self) -> u64 {
        self.misses
    }
}
