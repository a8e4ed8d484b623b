//! Tile dataset: converts quadtree indices into exact pixel windows against
//! a raster source at an appropriate resolution tier.
//!
//! [`RasterDataset`] owns the windowing policy: geodetic patch to pixel
//! window, overview (tier) selection, one-pixel border padding, splitting of
//! reads that straddle the dataset edge or antimeridian, optional per-tile
//! min/max statistics, and classification of the outcome into a
//! [`TileStatus`]. The pixels themselves come from a [`RasterSource`]
//! backend: GDAL in production, a procedural source for debug layers and
//! tests.
//!
//! Per-tile read failures never escape as errors; they are recorded in the
//! returned [`TileIoResult`] status.

mod gdal_source;
mod region;
mod source;

pub use gdal_source::GdalRasterSource;
pub use region::PixelRegion;
pub use source::{MemoryRasterSource, RasterSource};

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{trace, warn};

use crate::geodetic::{Geodetic, GeodeticPatch, Quad};
use crate::tile::{
    Tile, TileDataLayout, TileDataType, TileIndex, TileMetaData, TileRaster, TileStatus,
};

/// Pixels of border padding added on each side of a tile so adjacent tiles
/// can be sampled seamlessly.
pub const TILE_PADDING: usize = 1;

/// Errors raised when opening or reading a raster source. Open errors are
/// fatal to the owning layer; read errors are absorbed into tile status.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open raster dataset {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("dataset {0} has no raster bands")]
    NoRasterBands(PathBuf),

    #[error("dataset {0} has no geo-transform")]
    MissingGeoTransform(PathBuf),

    #[error("raster read failed: {0}")]
    Read(#[from] gdal::errors::GdalError),

    #[error("unsupported raster data type {0}")]
    UnsupportedDataType(String),

    #[error("no resolution tier {0}")]
    NoSuchTier(usize),

    #[error("no raster band {0}")]
    NoSuchBand(usize),
}

/// Linear mapping from raw height samples to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileDepthTransform {
    pub depth_scale: f32,
    pub depth_offset: f32,
}

impl Default for TileDepthTransform {
    fn default() -> Self {
        Self {
            depth_scale: 1.0,
            depth_offset: 0.0,
        }
    }
}

/// Result of one dataset read: decoded pixels, dimensions and a status.
#[derive(Debug, Clone)]
pub struct TileIoResult {
    pub index: TileIndex,
    pub status: TileStatus,
    pub pixels: Bytes,
    /// Width and height in pixels, including the border padding.
    pub dimensions: (u32, u32),
    pub layout: TileDataLayout,
    pub metadata: Option<TileMetaData>,
}

impl TileIoResult {
    /// A data-less result carrying only a status.
    pub fn with_status(index: TileIndex, status: TileStatus, layout: TileDataLayout) -> Self {
        Self {
            index,
            status,
            pixels: Bytes::new(),
            dimensions: (0, 0),
            layout,
            metadata: None,
        }
    }

    /// Converts the result into the cache-owned tile form.
    pub fn into_tile(self) -> Tile {
        let raster = (self.status == TileStatus::Ok).then(|| TileRaster {
            pixels: self.pixels,
            dimensions: self.dimensions,
            layout: self.layout,
        });
        Tile {
            status: self.status,
            raster,
            metadata: self.metadata.map(Arc::new),
        }
    }
}

/// Per-dataset read configuration.
#[derive(Debug, Clone, Copy)]
pub struct DatasetConfig {
    /// Smallest tile side length, in pixels, a read should produce.
    pub minimum_pixel_size: u32,
    /// Compute per-tile min/max statistics over the decoded buffer.
    pub preprocess_tiles: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            minimum_pixel_size: 512,
            preprocess_tiles: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct GeodeticExtent {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

/// A raster source plus everything computed once at open time: tier table,
/// band layout, depth transform, geodetic extent and the deepest chunk level
/// the source can serve at full quality.
pub struct RasterDataset {
    source: Box<dyn RasterSource>,
    config: DatasetConfig,
    layout: TileDataLayout,
    depth_transform: TileDepthTransform,
    geo_transform: [f64; 6],
    extent: GeodeticExtent,
    wraps_lon: bool,
    max_chunk_level: u8,
    no_data: Option<f64>,
}

impl RasterDataset {
    pub fn new(source: Box<dyn RasterSource>, config: DatasetConfig) -> Result<Self, DatasetError> {
        let layout = TileDataLayout::new(source.data_type(), source.band_count());
        let (scale, offset) = source.scale_offset();
        let depth_transform = TileDepthTransform {
            depth_scale: scale as f32,
            depth_offset: offset as f32,
        };
        let geo_transform = source.geo_transform();
        let (width, height) = source.raster_size();

        let extent = compute_extent(&geo_transform, width, height);
        let wraps_lon = (extent.max_lon - extent.min_lon).to_degrees() >= 359.0;

        let lon_extent_deg = (extent.max_lon - extent.min_lon).to_degrees();
        let deg_per_px = lon_extent_deg / width as f64;
        let levels = 180.0 / (deg_per_px * config.minimum_pixel_size as f64);
        let max_chunk_level = if levels > 1.0 {
            (levels.log2().floor() as i64).clamp(0, 31) as u8
        } else {
            0
        };

        let no_data = source.no_data_value();

        Ok(Self {
            source,
            config,
            layout,
            depth_transform,
            geo_transform,
            extent,
            wraps_lon,
            max_chunk_level,
            no_data,
        })
    }

    /// Opens a GDAL-readable raster at `path`.
    pub fn open(path: &std::path::Path, config: DatasetConfig) -> Result<Self, DatasetError> {
        let source = GdalRasterSource::open(path)?;
        Self::new(Box::new(source), config)
    }

    /// Deepest chunk level the source serves without upsampling.
    pub fn max_chunk_level(&self) -> u8 {
        self.max_chunk_level
    }

    pub fn layout(&self) -> TileDataLayout {
        self.layout
    }

    pub fn depth_transform(&self) -> TileDepthTransform {
        self.depth_transform
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.no_data
    }

    /// Reads the decoded pixel data for one quadtree index.
    ///
    /// Never fails: read problems are classified into the result status and
    /// the selector falls back to an ancestor tile.
    pub fn read_tile_data(&self, index: TileIndex) -> TileIoResult {
        let patch = GeodeticPatch::from_index(&index);
        if !patch.intersects_rect(
            self.extent.min_lat,
            self.extent.max_lat,
            self.extent.min_lon,
            self.extent.max_lon,
        ) {
            return TileIoResult::with_status(index, TileStatus::OutOfRange, self.layout);
        }

        let core = self.config.minimum_pixel_size as usize;
        let out_w = core + 2 * TILE_PADDING;
        let out_h = core + 2 * TILE_PADDING;

        // Full-resolution float window of the patch.
        let (px0, py0) = self.geodetic_to_pixel(patch.corner(Quad::NorthWest));
        let (px1, py1) = self.geodetic_to_pixel(patch.corner(Quad::SouthEast));
        let full_w = px1 - px0;
        let full_h = py1 - py0;
        if full_w <= 0.0 || full_h <= 0.0 {
            return TileIoResult::with_status(index, TileStatus::OutOfRange, self.layout);
        }

        // Pick the most downsampled tier whose window still covers the
        // minimum pixel size; fall back to the finest tier when even that
        // is too coarse (upsampling near the maximum level).
        let (raster_w, raster_h) = self.source.raster_size();
        let mut tier = 0usize;
        for (t, (tw, _)) in self.source.tier_sizes().iter().enumerate() {
            let w_t = full_w * (*tw as f64) / raster_w as f64;
            if w_t >= core as f64 {
                tier = t;
            }
        }
        let (tier_w, tier_h) = self.source.tier_sizes()[tier];
        let scale_x = raster_w as f64 / tier_w as f64;
        let scale_y = raster_h as f64 / tier_h as f64;

        let tier_x0 = px0 / scale_x;
        let tier_x1 = px1 / scale_x;
        let tier_y0 = py0 / scale_y;
        let tier_y1 = py1 / scale_y;
        let pad_x = (tier_x1 - tier_x0) / core as f64 * TILE_PADDING as f64;
        let pad_y = (tier_y1 - tier_y0) / core as f64 * TILE_PADDING as f64;

        let region = PixelRegion::new(
            (
                (tier_x0 - pad_x).floor() as i64,
                (tier_y0 - pad_y).floor() as i64,
            ),
            (
                ((tier_x1 + pad_x).ceil() - (tier_x0 - pad_x).floor()) as i64,
                ((tier_y1 + pad_y).ceil() - (tier_y0 - pad_y).floor()) as i64,
            ),
        );

        let region = region.clamped_y(tier_h as i64);
        if region.is_empty() {
            return TileIoResult::with_status(index, TileStatus::OutOfRange, self.layout);
        }

        let parts = match self.split_x(region, tier_w as i64, out_w) {
            Some(parts) => parts,
            None => {
                return TileIoResult::with_status(index, TileStatus::OutOfRange, self.layout);
            }
        };

        trace!(%index, tier, ?region, parts = parts.len(), "tile read");

        let bps = self.layout.data_type.bytes_per_sample();
        let row_bytes = out_w * bps;
        let mut pixels = Vec::with_capacity(row_bytes * out_h * self.layout.bands);
        let mut status = TileStatus::Ok;

        for band in 0..self.layout.bands {
            let mut band_buf = vec![0u8; row_bytes * out_h];
            let mut x_offset = 0usize;
            for (part, part_out_w) in &parts {
                match self.source.read_region(tier, band, *part, (*part_out_w, out_h)) {
                    Ok(bytes) => {
                        let part_row = part_out_w * bps;
                        for row in 0..out_h {
                            let dst = row * row_bytes + x_offset * bps;
                            let src = row * part_row;
                            if src + part_row <= bytes.len() {
                                band_buf[dst..dst + part_row]
                                    .copy_from_slice(&bytes[src..src + part_row]);
                            }
                        }
                    }
                    Err(error) => {
                        warn!(%index, band, %error, "tile region read failed");
                        status = TileStatus::IoError;
                    }
                }
                x_offset += part_out_w;
            }
            pixels.extend_from_slice(&band_buf);
        }

        let metadata = (self.config.preprocess_tiles && status == TileStatus::Ok)
            .then(|| self.compute_metadata(&pixels, out_w * out_h));

        TileIoResult {
            index,
            status,
            pixels: Bytes::from(pixels),
            dimensions: (out_w as u32, out_h as u32),
            layout: self.layout,
            metadata,
        }
    }

    /// Splits a horizontal window at the dataset edge. Returns the read
    /// parts with their share of the output width, or `None` when the window
    /// lies entirely outside a non-wrapping dataset.
    fn split_x(
        &self,
        region: PixelRegion,
        tier_w: i64,
        out_w: usize,
    ) -> Option<Vec<(PixelRegion, usize)>> {
        if !self.wraps_lon {
            let clamped = region.clamped_x(tier_w);
            if clamped.is_empty() {
                return None;
            }
            return Some(vec![(clamped, out_w)]);
        }

        // Wrapping dataset: normalize the start column, then split a window
        // that crosses the eastern edge into two reads across the seam.
        let mut start = region.start.0.rem_euclid(tier_w);
        let size = region.size.0.min(tier_w);
        if size == tier_w {
            start = 0;
        }
        if start + size <= tier_w {
            return Some(vec![(
                PixelRegion::new((start, region.start.1), (size, region.size.1)),
                out_w,
            )]);
        }

        let west_size = tier_w - start;
        let east_size = size - west_size;
        let west_out = ((out_w as i64 * west_size) / size).max(1) as usize;
        let east_out = out_w.saturating_sub(west_out).max(1);
        Some(vec![
            (
                PixelRegion::new((start, region.start.1), (west_size, region.size.1)),
                west_out,
            ),
            (
                PixelRegion::new((0, region.start.1), (east_size, region.size.1)),
                east_out,
            ),
        ])
    }

    fn compute_metadata(&self, pixels: &[u8], samples_per_band: usize) -> TileMetaData {
        let bps = self.layout.data_type.bytes_per_sample();
        let band_bytes = samples_per_band * bps;
        let mut min_values = Vec::with_capacity(self.layout.bands);
        let mut max_values = Vec::with_capacity(self.layout.bands);
        for band in 0..self.layout.bands {
            let slice = &pixels[band * band_bytes..(band + 1) * band_bytes];
            let (min, max) = sample_min_max(slice, self.layout.data_type, self.no_data);
            min_values.push(min);
            max_values.push(max);
        }
        TileMetaData {
            min_values,
            max_values,
        }
    }

    /// Inverts the affine geo-transform, mapping radians to full-resolution
    /// pixel coordinates.
    fn geodetic_to_pixel(&self, g: Geodetic) -> (f64, f64) {
        let gt = &self.geo_transform;
        let lon = g.lon_degrees();
        let lat = g.lat_degrees();
        let det = gt[1] * gt[5] - gt[2] * gt[4];
        let px = ((lon - gt[0]) * gt[5] - (lat - gt[3]) * gt[2]) / det;
        let py = ((lat - gt[3]) * gt[1] - (lon - gt[0]) * gt[4]) / det;
        (px, py)
    }
}

fn compute_extent(gt: &[f64; 6], width: usize, height: usize) -> GeodeticExtent {
    let corners = [
        (0.0, 0.0),
        (width as f64, 0.0),
        (0.0, height as f64),
        (width as f64, height as f64),
    ];
    let mut min_lon = f64::MAX;
    let mut max_lon = f64::MIN;
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    for (px, py) in corners {
        let lon = gt[0] + px * gt[1] + py * gt[2];
        let lat = gt[3] + px * gt[4] + py * gt[5];
        min_lon = min_lon.min(lon);
        max_lon = max_lon.max(lon);
        min_lat = min_lat.min(lat);
        max_lat = max_lat.max(lat);
    }
    GeodeticExtent {
        min_lat: min_lat.to_radians(),
        max_lat: max_lat.to_radians(),
        min_lon: min_lon.to_radians(),
        max_lon: max_lon.to_radians(),
    }
}

fn sample_min_max(bytes: &[u8], data_type: TileDataType, no_data: Option<f64>) -> (f32, f32) {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    let mut fold = |v: f32| {
        if let Some(nd) = no_data {
            if (v as f64 - nd).abs() < 1e-9 {
                return;
            }
        }
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    };

    macro_rules! scan {
        ($t:ty) => {
            for chunk in bytes.chunks_exact(std::mem::size_of::<$t>()) {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(chunk);
                fold(<$t>::from_ne_bytes(raw) as f32);
            }
        };
    }

    match data_type {
        TileDataType::UInt8 => scan!(u8),
        TileDataType::UInt16 => scan!(u16),
        TileDataType::Int16 => scan!(i16),
        TileDataType::UInt32 => scan!(u32),
        TileDataType::Int32 => scan!(i32),
        TileDataType::Float32 => scan!(f32),
        TileDataType::Float64 => {
            for chunk in bytes.chunks_exact(8) {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                fold(f64::from_ne_bytes(raw) as f32);
            }
        }
    }

    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}
