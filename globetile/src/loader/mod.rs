//! Asynchronous tile loading: load jobs plus the de-duplicating async
//! provider that feeds them to a worker pool.
//!
//! The dataset handle is wrapped in a mutex and owned by the provider's own
//! pool; pools are typically sized to one worker because a raster handle is
//! not assumed safe for concurrent reads.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::cache::{DiskCacheMode, TileDiskCache};
use crate::dataset::{RasterDataset, TileDepthTransform, TileIoResult};
use crate::jobs::{Job, JobManager};
use crate::tile::{TileDataLayout, TileHashKey, TileIndex, TileStatus};

/// Reads one tile straight from the dataset.
pub struct TileLoadJob {
    dataset: Arc<Mutex<RasterDataset>>,
    index: TileIndex,
    result: Option<TileIoResult>,
}

impl TileLoadJob {
    pub fn new(dataset: Arc<Mutex<RasterDataset>>, index: TileIndex) -> Self {
        Self {
            dataset,
            index,
            result: None,
        }
    }
}

impl Job for TileLoadJob {
    type Product = TileIoResult;

    fn execute(&mut self) {
        let dataset = self.dataset.lock();
        self.result = Some(dataset.read_tile_data(self.index));
    }

    fn product(self: Box<Self>) -> TileIoResult {
        let layout = self.dataset.lock().layout();
        self.result
            .unwrap_or_else(|| TileIoResult::with_status(self.index, TileStatus::IoError, layout))
    }

    fn failure_product(&self) -> TileIoResult {
        let layout = self.dataset.lock().layout();
        TileIoResult::with_status(self.index, TileStatus::IoError, layout)
    }
}

/// Reads one tile, consulting and/or populating the disk cache according to
/// the configured [`DiskCacheMode`].
pub struct DiskCachedTileLoadJob {
    dataset: Arc<Mutex<RasterDataset>>,
    index: TileIndex,
    disk_cache: Arc<TileDiskCache>,
    mode: DiskCacheMode,
    result: Option<TileIoResult>,
}

impl DiskCachedTileLoadJob {
    pub fn new(
        dataset: Arc<Mutex<RasterDataset>>,
        index: TileIndex,
        disk_cache: Arc<TileDiskCache>,
        mode: DiskCacheMode,
    ) -> Self {
        Self {
            dataset,
            index,
            disk_cache,
            mode,
            result: None,
        }
    }

    fn read_dataset(&self) -> TileIoResult {
        self.dataset.lock().read_tile_data(self.index)
    }

    fn write_back(&self, result: &TileIoResult) {
        if let Err(error) = self.disk_cache.put(&self.index, result) {
            warn!(index = %self.index, %error, "disk cache write failed");
        }
    }
}

impl Job for DiskCachedTileLoadJob {
    type Product = TileIoResult;

    fn execute(&mut self) {
        let result = match self.mode {
            DiskCacheMode::Disabled => self.read_dataset(),
            DiskCacheMode::ReadOnly => match self.disk_cache.get(&self.index) {
                Some(cached) => cached,
                None => self.read_dataset(),
            },
            DiskCacheMode::ReadAndWrite => match self.disk_cache.get(&self.index) {
                Some(cached) => cached,
                None => {
                    let result = self.read_dataset();
                    self.write_back(&result);
                    result
                }
            },
            DiskCacheMode::WriteOnly => {
                let result = self.read_dataset();
                self.write_back(&result);
                result
            }
            DiskCacheMode::CacheHitsOnly => match self.disk_cache.get(&self.index) {
                Some(cached) => cached,
                None => TileIoResult::with_status(
                    self.index,
                    TileStatus::Unavailable,
                    self.dataset.lock().layout(),
                ),
            },
        };
        self.result = Some(result);
    }

    fn product(self: Box<Self>) -> TileIoResult {
        let layout = self.dataset.lock().layout();
        self.result
            .unwrap_or_else(|| TileIoResult::with_status(self.index, TileStatus::IoError, layout))
    }

    fn failure_product(&self) -> TileIoResult {
        let layout = self.dataset.lock().layout();
        TileIoResult::with_status(self.index, TileStatus::IoError, layout)
    }
}

/// Enqueues tile loads with de-duplication and drains their results.
///
/// `enqueue_tile_io` refuses a request when an equivalent one (same level,
/// within one grid step) is already outstanding, bounding queue growth
/// while the camera moves.
pub struct AsyncTileDataProvider {
    dataset: Arc<Mutex<RasterDataset>>,
    job_manager: JobManager<TileIoResult>,
    enqueued: HashMap<TileHashKey, TileIndex>,
    disk_cache: Option<(Arc<TileDiskCache>, DiskCacheMode)>,
}

impl AsyncTileDataProvider {
    pub fn new(dataset: RasterDataset, workers: usize) -> io::Result<Self> {
        Ok(Self {
            dataset: Arc::new(Mutex::new(dataset)),
            job_manager: JobManager::new(workers)?,
            enqueued: HashMap::new(),
            disk_cache: None,
        })
    }

    /// Routes subsequent loads through the disk cache.
    pub fn with_disk_cache(mut self, cache: Arc<TileDiskCache>, mode: DiskCacheMode) -> Self {
        if mode != DiskCacheMode::Disabled {
            self.disk_cache = Some((cache, mode));
        }
        self
    }

    pub fn max_chunk_level(&self) -> u8 {
        self.dataset.lock().max_chunk_level()
    }

    pub fn layout(&self) -> TileDataLayout {
        self.dataset.lock().layout()
    }

    pub fn depth_transform(&self) -> TileDepthTransform {
        self.dataset.lock().depth_transform()
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.dataset.lock().no_data_value()
    }

    /// Submits a load for `index` unless an equivalent request is already
    /// outstanding. Returns whether a job was enqueued.
    pub fn enqueue_tile_io(&mut self, index: TileIndex) -> bool {
        if !self.satisfies_enqueue_criteria(&index) {
            return false;
        }

        let job: Box<dyn Job<Product = TileIoResult>> = match &self.disk_cache {
            Some((cache, mode)) => Box::new(DiskCachedTileLoadJob::new(
                Arc::clone(&self.dataset),
                index,
                Arc::clone(cache),
                *mode,
            )),
            None => Box::new(TileLoadJob::new(Arc::clone(&self.dataset), index)),
        };
        self.job_manager.enqueue_job(job);
        self.enqueued.insert(index.hash_key(), index);
        trace!(%index, outstanding = self.enqueued.len(), "enqueued tile load");
        true
    }

    pub fn has_loaded_tile_data(&self) -> bool {
        self.job_manager.num_finished_jobs() > 0
    }

    /// Pops one completed load, clearing its outstanding-request entry.
    /// Never blocks.
    pub fn next_tile_io_result(&mut self) -> Option<TileIoResult> {
        let result = self.job_manager.pop_finished_job()?;
        self.enqueued.remove(&result.index.hash_key());
        Some(result)
    }

    /// Drops all not-yet-started requests and clears the bookkeeping.
    /// Already-running loads still finish; their results are simply stale.
    pub fn clear_request_queue(&mut self) {
        let dropped = self.job_manager.clear_enqueued_jobs();
        if dropped > 0 {
            trace!(dropped, "cleared pending tile requests");
        }
        self.enqueued.clear();
    }

    pub fn outstanding_requests(&self) -> usize {
        self.enqueued.len()
    }

    fn satisfies_enqueue_criteria(&self, index: &TileIndex) -> bool {
        !self
            .enqueued
            .values()
            .any(|other| other.level == index.level && index.manhattan(other) <= 1)
    }
}
