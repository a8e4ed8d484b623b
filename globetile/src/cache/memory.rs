//! In-memory tile cache with strict LRU eviction.
//!
//! Keyed by the tile hash key; capacity is a fixed entry count set at
//! construction. `get` marks an entry most-recently-used, `put` inserts or
//! replaces and evicts the single least-recently-used entry when over
//! capacity. Both are O(1) through the `lru` crate's hashmap + intrusive
//! recency list.
//!
//! The cache is owned and touched by the main thread only; workers hand
//! finished tiles to the main thread, which inserts them during the
//! per-frame provider update.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::trace;

use super::CacheStats;
use crate::tile::{Tile, TileHashKey};

/// Bounded key-to-tile map with recency-based eviction.
pub struct TileCache {
    entries: LruCache<TileHashKey, Tile>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl TileCache {
    /// Creates a cache holding at most `capacity` tiles (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::MIN.saturating_add(capacity.saturating_sub(1));
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Returns the tile if present and marks it most-recently-used.
    pub fn get(&mut self, key: TileHashKey) -> Option<Tile> {
        match self.entries.get(&key) {
            Some(tile) => {
                self.hits += 1;
                Some(tile.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Returns the tile without touching recency or statistics.
    pub fn peek(&self, key: TileHashKey) -> Option<&Tile> {
        self.entries.peek(&key)
    }

    /// Inserts or replaces; evicts the least-recently-used entry when the
    /// capacity is exceeded.
    pub fn put(&mut self, key: TileHashKey, tile: Tile) {
        if let Some((evicted_key, _)) = self.entries.push(key, tile) {
            if evicted_key != key {
                self.evictions += 1;
                trace!(key = evicted_key, "evicted least-recently-used tile");
            }
        }
    }

    pub fn contains(&self, key: TileHashKey) -> bool {
        self.entries.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.entries.len(),
        }
    }
}
