//! Tile caching: a bounded in-memory LRU map plus an optional disk-backed
//! companion for decoded buffers.

mod disk;
mod memory;

pub use disk::{DiskCacheMode, TileDiskCache};
pub use memory::TileCache;

use thiserror::Error;

/// Cache-related errors. Only the disk-backed cache produces these; the
/// in-memory cache cannot fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encode error: {0}")]
    Encode(#[from] bincode::Error),
}

/// Counters exposed by the in-memory cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}
