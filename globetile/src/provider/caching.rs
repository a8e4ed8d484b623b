//! Caching tile provider: one dataset, one async loader, one LRU cache.

use std::path::Path;

use tracing::debug;

use super::{ProviderError, ProviderInitData, TileSource};
use crate::cache::TileCache;
use crate::dataset::{DatasetConfig, RasterDataset, TileDepthTransform};
use crate::loader::AsyncTileDataProvider;
use crate::tile::{Tile, TileIndex, TileStatus};

/// Serves tiles from an in-memory cache, firing asynchronous loads on
/// misses. `update` drains completed loads into the cache and periodically
/// flushes the request queue so requests the camera has moved past do not
/// pile up.
pub struct CachingTileProvider {
    async_provider: AsyncTileDataProvider,
    cache: TileCache,
    frames_until_flush: u32,
    frames_since_flush: u32,
    max_level: u8,
    depth_transform: TileDepthTransform,
    no_data: Option<f64>,
    default_tile: Tile,
}

impl CachingTileProvider {
    /// Opens the raster at `path` and wraps it. Fails when the dataset
    /// cannot be opened; this is fatal for the owning layer.
    pub fn from_path(path: &Path, init: &ProviderInitData) -> Result<Self, ProviderError> {
        let dataset = RasterDataset::open(
            path,
            DatasetConfig {
                minimum_pixel_size: init.minimum_pixel_size,
                preprocess_tiles: init.preprocess_tiles,
            },
        )?;
        debug!(path = %path.display(), "caching tile provider created");
        Self::from_dataset(dataset, init)
    }

    /// Wraps an already-open dataset (synthetic sources included).
    pub fn from_dataset(
        dataset: RasterDataset,
        init: &ProviderInitData,
    ) -> Result<Self, ProviderError> {
        let max_level = dataset.max_chunk_level();
        let depth_transform = dataset.depth_transform();
        let no_data = dataset.no_data_value();
        let default_tile = Tile::solid(128, dataset.layout());

        let mut async_provider = AsyncTileDataProvider::new(dataset, init.threads.max(1))?;
        if let Some((cache, mode)) = &init.disk_cache {
            async_provider = async_provider.with_disk_cache(std::sync::Arc::clone(cache), *mode);
        }

        Ok(Self {
            async_provider,
            cache: TileCache::new(init.cache_size),
            frames_until_flush: init.frames_until_request_queue_flush.max(1),
            frames_since_flush: 0,
            max_level,
            depth_transform,
            no_data,
            default_tile,
        })
    }

    /// Current best-known tile. A miss enqueues a load and reports
    /// unavailable for this frame; the data becomes visible on a later
    /// frame once `update` has drained it.
    pub fn tile(&mut self, index: &TileIndex) -> Tile {
        if index.level > self.max_level {
            return Tile::with_status(TileStatus::OutOfRange);
        }
        match self.cache.get(index.hash_key()) {
            Some(tile) => tile,
            None => {
                self.async_provider.enqueue_tile_io(*index);
                Tile::UNAVAILABLE
            }
        }
    }

    pub fn tile_status(&self, index: &TileIndex) -> TileStatus {
        if index.level > self.max_level {
            return TileStatus::OutOfRange;
        }
        self.cache
            .peek(index.hash_key())
            .map(|tile| tile.status)
            .unwrap_or(TileStatus::Unavailable)
    }

    /// Drains finished loads into the cache. Called once per frame.
    pub fn update(&mut self) {
        while let Some(result) = self.async_provider.next_tile_io_result() {
            let key = result.index.hash_key();
            self.cache.put(key, result.into_tile());
        }

        self.frames_since_flush += 1;
        if self.frames_since_flush >= self.frames_until_flush {
            self.async_provider.clear_request_queue();
            self.frames_since_flush = 0;
        }
    }

    pub fn reset(&mut self) {
        self.cache.clear();
        self.async_provider.clear_request_queue();
    }

    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    pub fn min_level(&self) -> u8 {
        1
    }

    pub fn depth_transform(&self) -> TileDepthTransform {
        self.depth_transform
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.no_data
    }

    pub fn no_data_value_as_float(&self) -> f32 {
        self.no_data.map(|v| v as f32).unwrap_or(f32::NAN)
    }

    pub fn default_tile(&self) -> Tile {
        self.default_tile.clone()
    }

    /// Read-only peek used by bounding-height queries.
    pub fn cached_tile(&self, index: &TileIndex) -> Option<&Tile> {
        self.cache.peek(index.hash_key())
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    pub fn outstanding_requests(&self) -> usize {
        self.async_provider.outstanding_requests()
    }
}

impl TileSource for CachingTileProvider {
    fn tile(&mut self, index: &TileIndex) -> Tile {
        CachingTileProvider::tile(self, index)
    }

    fn tile_status(&self, index: &TileIndex) -> TileStatus {
        CachingTileProvider::tile_status(self, index)
    }

    fn max_level(&self) -> u8 {
        CachingTileProvider::max_level(self)
    }

    fn min_level(&self) -> u8 {
        CachingTileProvider::min_level(self)
    }

    fn default_tile(&self) -> Tile {
        CachingTileProvider::default_tile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryRasterSource;
    use std::time::{Duration, Instant};

    fn provider(min_pixel: u32) -> CachingTileProvider {
        let dataset = RasterDataset::new(
            Box::new(MemoryRasterSource::global(2048, 1024, 3, 1)),
            DatasetConfig {
                minimum_pixel_size: min_pixel,
                preprocess_tiles: true,
            },
        )
        .unwrap();
        CachingTileProvider::from_dataset(
            dataset,
            &ProviderInitData {
                minimum_pixel_size: min_pixel,
                cache_size: 32,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn update_until_cached(provider: &mut CachingTileProvider, index: &TileIndex) -> Tile {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            provider.update();
            let tile = provider.tile(index);
            if tile.status != TileStatus::Unavailable {
                return tile;
            }
            assert!(Instant::now() < deadline, "tile never arrived");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_miss_returns_unavailable_and_enqueues() {
        let mut p = provider(64);
        let index = TileIndex::new(0, 0, 1);
        let tile = p.tile(&index);
        assert_eq!(tile.status, TileStatus::Unavailable);
        assert_eq!(p.outstanding_requests(), 1);
    }

    #[test]
    fn test_update_makes_tile_visible_on_later_frame() {
        let mut p = provider(64);
        let index = TileIndex::new(1, 0, 1);
        assert_eq!(p.tile(&index).status, TileStatus::Unavailable);
        let tile = update_until_cached(&mut p, &index);
        assert_eq!(tile.status, TileStatus::Ok);
        assert!(tile.raster.is_some());
        assert!(tile.metadata.is_some());
    }

    #[test]
    fn test_beyond_max_level_is_out_of_range() {
        let p = provider(512);
        assert_eq!(p.max_level(), 1);
        assert_eq!(
            p.tile_status(&TileIndex::new(0, 0, 5)),
            TileStatus::OutOfRange
        );
    }

    #[test]
    fn test_tile_status_does_not_enqueue() {
        let p = provider(64);
        assert_eq!(
            p.tile_status(&TileIndex::new(0, 0, 1)),
            TileStatus::Unavailable
        );
        assert_eq!(p.outstanding_requests(), 0);
    }

    #[test]
    fn test_reset_clears_cache() {
        let mut p = provider(64);
        let index = TileIndex::new(0, 0, 1);
        p.tile(&index);
        update_until_cached(&mut p, &index);
        p.reset();
        assert_eq!(p.tile_status(&index), TileStatus::Unavailable);
    }

    #[test]
    fn test_request_queue_flush_after_configured_frames() {
        let dataset = RasterDataset::new(
            Box::new(MemoryRasterSource::global(2048, 1024, 3, 1)),
            DatasetConfig {
                minimum_pixel_size: 64,
                preprocess_tiles: false,
            },
        )
        .unwrap();
        let mut p = CachingTileProvider::from_dataset(
            dataset,
            &ProviderInitData {
                minimum_pixel_size: 64,
                frames_until_request_queue_flush: 2,
                ..Default::default()
            },
        )
        .unwrap();

        p.tile(&TileIndex::new(0, 0, 3));
        p.tile(&TileIndex::new(8, 0, 3));
        assert_eq!(p.outstanding_requests(), 2);
        p.update();
        p.update();
        // After the flush window the bookkeeping is clear (whatever already
        // completed was drained into the cache instead).
        assert_eq!(p.outstanding_requests(), 0);
    }
}
