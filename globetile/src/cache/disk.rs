//! Disk-backed tile cache.
//!
//! Persists decoded tile buffers keyed by the chunk-index hash under a root
//! directory with a two-level fan-out, one bincode record per tile. The
//! format is private and version-unstable; a record that fails to decode is
//! discarded and re-read from the source dataset.
//!
//! The cache is consulted and populated from worker threads inside disk-aware
//! load jobs, so the in-memory index of on-disk entries is a `DashMap`.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CacheError;
use crate::dataset::TileIoResult;
use crate::tile::{
    TileDataLayout, TileDataType, TileHashKey, TileIndex, TileMetaData, TileStatus,
};

/// Per-load policy controlling whether a load job consults and/or populates
/// the disk cache before or instead of re-reading the source dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DiskCacheMode {
    /// Never touch the disk cache.
    #[default]
    Disabled,
    /// Consult the cache; on a miss read the dataset without writing back.
    ReadOnly,
    /// Consult the cache; on a miss read the dataset and write the result.
    ReadAndWrite,
    /// Always read the dataset and write the result.
    WriteOnly,
    /// Serve cache hits only; a miss yields an unavailable result.
    CacheHitsOnly,
}

#[derive(Serialize, Deserialize)]
struct DiskRecord {
    x: u32,
    y: u32,
    level: u8,
    status: u8,
    width: u32,
    height: u32,
    data_type: u8,
    bands: u32,
    pixels: Vec<u8>,
    min_values: Option<Vec<f32>>,
    max_values: Option<Vec<f32>>,
}

/// Filesystem-persisted tile store keyed by chunk-index hash.
pub struct TileDiskCache {
    root: PathBuf,
    index: DashMap<TileHashKey, u64>,
}

impl TileDiskCache {
    /// Opens (or creates) a cache rooted at `root` and rebuilds the entry
    /// index from the files already present.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let index = DashMap::new();
        let mut indexed = 0u64;
        for shard in fs::read_dir(&root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                if let Some(key) = parse_entry_name(&entry.path()) {
                    let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    index.insert(key, size);
                    indexed += 1;
                }
            }
        }
        debug!(root = %root.display(), entries = indexed, "opened tile disk cache");

        Ok(Self { root, index })
    }

    /// Reads a cached result, or `None` on a miss or an undecodable record.
    pub fn get(&self, index: &TileIndex) -> Option<TileIoResult> {
        let key = index.hash_key();
        if !self.index.contains_key(&key) {
            return None;
        }
        let path = self.entry_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%index, %error, "disk cache entry unreadable; dropping");
                self.index.remove(&key);
                return None;
            }
        };
        match bincode::deserialize::<DiskRecord>(&raw) {
            Ok(record) => Some(record_to_result(record)),
            Err(error) => {
                warn!(%index, %error, "disk cache entry corrupt; dropping");
                self.index.remove(&key);
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Persists a result. Data-less statuses are stored too, so repeated
    /// out-of-range reads can be answered from disk.
    pub fn put(&self, index: &TileIndex, result: &TileIoResult) -> Result<(), CacheError> {
        let key = index.hash_key();
        let record = result_to_record(index, result);
        let encoded = bincode::serialize(&record)?;

        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &encoded)?;
        self.index.insert(key, encoded.len() as u64);
        Ok(())
    }

    pub fn contains(&self, index: &TileIndex) -> bool {
        self.index.contains_key(&index.hash_key())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.index.iter().map(|entry| *entry.value()).sum()
    }

    fn entry_path(&self, key: TileHashKey) -> PathBuf {
        self.root
            .join(format!("{:02x}", key & 0xff))
            .join(format!("{key:016x}.tile"))
    }
}

fn parse_entry_name(path: &Path) -> Option<TileHashKey> {
    let stem = path.file_stem()?.to_str()?;
    if path.extension()?.to_str()? != "tile" {
        return None;
    }
    TileHashKey::from_str_radix(stem, 16).ok()
}

fn status_to_byte(status: TileStatus) -> u8 {
    match status {
        TileStatus::Unavailable => 0,
        TileStatus::OutOfRange => 1,
        TileStatus::IoError => 2,
        TileStatus::Ok => 3,
    }
}

fn status_from_byte(byte: u8) -> TileStatus {
    match byte {
        1 => TileStatus::OutOfRange,
        2 => TileStatus::IoError,
        3 => TileStatus::Ok,
        _ => TileStatus::Unavailable,
    }
}

fn data_type_to_byte(data_type: TileDataType) -> u8 {
    match data_type {
        TileDataType::UInt8 => 0,
        TileDataType::UInt16 => 1,
        TileDataType::Int16 => 2,
        TileDataType::UInt32 => 3,
        TileDataType::Int32 => 4,
        TileDataType::Float32 => 5,
        TileDataType::Float64 => 6,
    }
}

fn data_type_from_byte(byte: u8) -> TileDataType {
    match byte {
        1 => TileDataType::UInt16,
        2 => TileDataType::Int16,
        3 => TileDataType::UInt32,
        4 => TileDataType::Int32,
        5 => TileDataType::Float32,
        6 => TileDataType::Float64,
        _ => TileDataType::UInt8,
    }
}

fn result_to_record(index: &TileIndex, result: &TileIoResult) -> DiskRecord {
    DiskRecord {
        x: index.x,
        y: index.y,
        level: index.level,
        status: status_to_byte(result.status),
        width: result.dimensions.0,
        height: result.dimensions.1,
        data_type: data_type_to_byte(result.layout.data_type),
        bands: result.layout.bands as u32,
        pixels: result.pixels.to_vec(),
        min_values: result.metadata.as_ref().map(|m| m.min_values.clone()),
        max_values: result.metadata.as_ref().map(|m| m.max_values.clone()),
    }
}

fn record_to_result(record: DiskRecord) -> TileIoResult {
    let metadata = match (record.min_values, record.max_values) {
        (Some(min_values), Some(max_values)) => Some(TileMetaData {
            min_values,
            max_values,
        }),
        _ => None,
    };
    TileIoResult {
        index: TileIndex::new(record.x, record.y, record.level),
        status: status_from_byte(record.status),
        pixels: Bytes::from(record.pixels),
        dimensions: (record.width, record.height),
        layout: TileDataLayout::new(
            data_type_from_byte(record.data_type),
            record.bands as usize,
        ),
        metadata,
    }
}
