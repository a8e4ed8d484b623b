//! Tile provider family.
//!
//! A provider answers `tile(index)` without ever blocking: on a cache miss it
//! returns an unavailable tile and (at most) fires an asynchronous load.
//! `update` is called once per frame on the main thread and drains finished
//! loads into the provider's cache.
//!
//! The family is a closed sum type ([`TileProvider`]) with three variants:
//! plain caching, temporal multiplexing over many underlying providers, and
//! video/streaming. The [`TileSource`] trait is the narrow seam the tile
//! selector works against, so tests can drive selection with scripted
//! sources.
//!
//! Failure semantics: malformed or unreachable dataset locators fail at
//! construction with a [`ProviderError`] and the layer never comes up;
//! per-tile I/O problems degrade to a [`TileStatus`] and the selector falls
//! back to an ancestor.

mod caching;
mod temporal;
mod video;

pub use caching::CachingTileProvider;
pub use temporal::{InterpolateTileProvider, TemporalTileProvider, TimeFormat};
pub use video::VideoTileProvider;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{DiskCacheMode, TileDiskCache};
use crate::dataset::{DatasetError, TileDepthTransform};
use crate::tile::{Tile, TileIndex, TileStatus};

/// Read-only per-frame inputs handed to providers during `update`.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Current simulation time.
    pub time: DateTime<Utc>,
    /// Monotonic frame counter.
    pub frame: u64,
}

/// The capability surface the tile selector needs from a provider.
pub trait TileSource {
    /// The current best-known tile for `index`. Never blocks; a miss returns
    /// an unavailable tile and may fire an asynchronous load.
    fn tile(&mut self, index: &TileIndex) -> Tile;

    /// Status of the cached tile for `index`, without firing a load.
    fn tile_status(&self, index: &TileIndex) -> TileStatus;

    /// Deepest level this provider serves at full quality.
    fn max_level(&self) -> u8;

    /// Shallowest level worth asking for.
    fn min_level(&self) -> u8 {
        1
    }

    /// The provider's explicit fallback tile for when nothing has loaded.
    fn default_tile(&self) -> Tile;
}

/// Construction-time errors. Fatal for the layer being built.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("failed to read dataset descriptor {path}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset descriptor {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown time format tag {0:?}")]
    UnknownTimeFormat(String),

    #[error("time key {key:?} does not match format {format}")]
    BadTimeKey { key: String, format: String },

    #[error("temporal descriptor has no time keys")]
    NoTimeKeys,

    #[error("video descriptor has no frames")]
    NoVideoFrames,

    #[error("video frame rate must be positive, got {0}")]
    BadFrameRate(f64),

    #[error("video frame {0} is unreachable")]
    MissingVideoFrame(PathBuf),

    #[error("failed to spawn worker threads: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Per-category parameters used when instantiating providers.
#[derive(Clone)]
pub struct ProviderInitData {
    /// Smallest tile side length in pixels a dataset read should produce.
    pub minimum_pixel_size: u32,
    /// Worker threads for the provider's own pool. One per dataset unless
    /// the source is known to tolerate concurrent reads.
    pub threads: usize,
    /// In-memory tile cache capacity, in entries.
    pub cache_size: usize,
    /// Flush the pending request queue every this many frames.
    pub frames_until_request_queue_flush: u32,
    /// Compute per-tile min/max statistics (height layers).
    pub preprocess_tiles: bool,
    /// Route loads through a shared disk cache.
    pub disk_cache: Option<(Arc<TileDiskCache>, DiskCacheMode)>,
}

impl Default for ProviderInitData {
    fn default() -> Self {
        Self {
            minimum_pixel_size: 1024,
            threads: 1,
            cache_size: 500,
            frames_until_request_queue_flush: 60,
            preprocess_tiles: false,
            disk_cache: None,
        }
    }
}

/// JSON descriptor wrapping non-plain dataset locators.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DatasetDescriptor {
    Temporal(TemporalDescriptor),
    Video(VideoDescriptor),
}

/// Temporal wrapper: a time-format tag plus a key-to-locator template.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalDescriptor {
    /// One of the supported textual time format tags, e.g. `YYYY-MM-DD`.
    pub time_format: String,
    /// Locator template; `${TimeKey}` is replaced per key.
    pub template: String,
    /// Known time keys, formatted per `time_format`.
    pub keys: Vec<String>,
    /// Blend the two temporally nearest providers between keys.
    #[serde(default)]
    pub interpolation: bool,
}

/// Video wrapper: an image sequence decoded on a frame-rate cadence.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub frame_rate: f64,
    pub frames: Vec<PathBuf>,
}

/// The provider sum type. See the module docs for the shared contract.
pub enum TileProvider {
    Caching(CachingTileProvider),
    Temporal(TemporalTileProvider),
    Video(VideoTileProvider),
}

impl TileProvider {
    /// Builds a provider from a dataset locator: a `.json` descriptor file
    /// (temporal or video wrapper) or any raster path GDAL can open.
    pub fn from_locator(path: &Path, init: &ProviderInitData) -> Result<Self, ProviderError> {
        let is_descriptor = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if !is_descriptor {
            return Ok(TileProvider::Caching(CachingTileProvider::from_path(
                path, init,
            )?));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ProviderError::Descriptor {
            path: path.to_path_buf(),
            source,
        })?;
        let descriptor: DatasetDescriptor =
            serde_json::from_str(&raw).map_err(|source| ProviderError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        match descriptor {
            DatasetDescriptor::Temporal(temporal) => Ok(TileProvider::Temporal(
                TemporalTileProvider::new(temporal, base_dir, init.clone())?,
            )),
            DatasetDescriptor::Video(video) => Ok(TileProvider::Video(VideoTileProvider::new(
                video, &base_dir,
            )?)),
        }
    }

    /// Drains finished work into the provider's cache. Called once per frame
    /// from the main thread; never blocks.
    pub fn update(&mut self, ctx: &FrameContext) {
        match self {
            TileProvider::Caching(p) => p.update(),
            TileProvider::Temporal(p) => p.update(ctx),
            TileProvider::Video(p) => p.update(ctx),
        }
    }

    /// Drops cached tiles and pending requests.
    pub fn reset(&mut self) {
        match self {
            TileProvider::Caching(p) => p.reset(),
            TileProvider::Temporal(p) => p.reset(),
            TileProvider::Video(p) => p.reset(),
        }
    }

    pub fn depth_transform(&self) -> TileDepthTransform {
        match self {
            TileProvider::Caching(p) => p.depth_transform(),
            TileProvider::Temporal(p) => p.depth_transform(),
            TileProvider::Video(_) => TileDepthTransform::default(),
        }
    }

    pub fn no_data_value_as_float(&self) -> f32 {
        match self {
            TileProvider::Caching(p) => p.no_data_value_as_float(),
            TileProvider::Temporal(p) => p.no_data_value_as_float(),
            TileProvider::Video(_) => f32::NAN,
        }
    }

    /// Peeks at the cached tile for `index` without firing loads or touching
    /// recency. Used for read-only queries like bounding heights.
    pub fn cached_tile(&self, index: &TileIndex) -> Option<&Tile> {
        match self {
            TileProvider::Caching(p) => p.cached_tile(index),
            TileProvider::Temporal(p) => p.cached_tile(index),
            TileProvider::Video(p) => p.current_tile(),
        }
    }
}

impl TileSource for TileProvider {
    fn tile(&mut self, index: &TileIndex) -> Tile {
        match self {
            TileProvider::Caching(p) => p.tile(index),
            TileProvider::Temporal(p) => p.tile(index),
            TileProvider::Video(p) => p.tile(index),
        }
    }

    fn tile_status(&self, index: &TileIndex) -> TileStatus {
        match self {
            TileProvider::Caching(p) => p.tile_status(index),
            TileProvider::Temporal(p) => p.tile_status(index),
            TileProvider::Video(p) => p.tile_status(index),
        }
    }

    fn max_level(&self) -> u8 {
        match self {
            TileProvider::Caching(p) => p.max_level(),
            TileProvider::Temporal(p) => p.max_level(),
            TileProvider::Video(p) => p.max_level(),
        }
    }

    fn min_level(&self) -> u8 {
        match self {
            TileProvider::Caching(p) => p.min_level(),
            TileProvider::Temporal(p) => p.min_level(),
            TileProvider::Video(p) => p.min_level(),
        }
    }

    fn default_tile(&self) -> Tile {
        match self {
            TileProvider::Caching(p) => p.default_tile(),
            TileProvider::Temporal(p) => p.default_tile(),
            TileProvider::Video(p) => p.default_tile(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_plain_locator_fails_at_construction() {
        let result = TileProvider::from_locator(
            Path::new("/nonexistent/dataset.tif"),
            &ProviderInitData::default(),
        );
        assert!(matches!(result, Err(ProviderError::Dataset(_))));
    }

    #[test]
    fn test_missing_descriptor_fails_at_construction() {
        let result = TileProvider::from_locator(
            Path::new("/nonexistent/descriptor.json"),
            &ProviderInitData::default(),
        );
        assert!(matches!(result, Err(ProviderError::Descriptor { .. })));
    }

    #[test]
    fn test_malformed_descriptor_fails_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layer.json");
        std::fs::write(&path, "{\"type\": \"temporal\"").unwrap();
        let result = TileProvider::from_locator(&path, &ProviderInitData::default());
        assert!(matches!(result, Err(ProviderError::Parse { .. })));
    }
}
