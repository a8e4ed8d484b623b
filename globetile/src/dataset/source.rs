//! The raster source seam and a synthetic in-memory implementation.
//!
//! [`RasterSource`] abstracts the pixel-producing backend of a dataset so the
//! windowing/overview/status policy in [`super::RasterDataset`] can be tested
//! without touching GDAL, and so procedural debug layers can be plugged in.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::region::PixelRegion;
use super::DatasetError;
use crate::tile::TileDataType;

/// A read-only raster backend with a resolution-tier pyramid.
///
/// Tier 0 is full resolution; each further tier is a precomputed coarser
/// version ("overview"). Regions handed to `read_region` are expressed in the
/// pixel coordinates of the addressed tier and are already clamped to its
/// bounds.
pub trait RasterSource: Send {
    /// Full-resolution raster size, (width, height).
    fn raster_size(&self) -> (usize, usize);

    /// Number of raster bands.
    fn band_count(&self) -> usize;

    /// Sample type shared by all bands.
    fn data_type(&self) -> TileDataType;

    /// GDAL-style affine transform from pixel to geographic degrees:
    /// `lon = gt[0] + px*gt[1] + py*gt[2]`, `lat = gt[3] + px*gt[4] + py*gt[5]`.
    fn geo_transform(&self) -> [f64; 6];

    /// Sizes of all resolution tiers, full resolution first.
    fn tier_sizes(&self) -> &[(usize, usize)];

    /// The source's no-data sample value, if any.
    fn no_data_value(&self) -> Option<f64> {
        None
    }

    /// Scale and offset mapping raw samples to physical units.
    fn scale_offset(&self) -> (f64, f64) {
        (1.0, 0.0)
    }

    /// Reads `region` of one band at the given tier, resampled to `out_size`,
    /// returning native-endian sample bytes in row-major order.
    fn read_region(
        &self,
        tier: usize,
        band: usize,
        region: PixelRegion,
        out_size: (usize, usize),
    ) -> Result<Vec<u8>, DatasetError>;
}

/// Procedural in-memory raster source.
///
/// Synthesizes a checkerboard whose samples depend only on full-resolution
/// pixel coordinates, so reads are reproducible across tiers. Used by debug
/// layers and throughout the test suite.
pub struct MemoryRasterSource {
    size: (usize, usize),
    tier_sizes: Vec<(usize, usize)>,
    bands: usize,
    geo_transform: [f64; 6],
    uniform_value: Option<u8>,
    last_read_tier: Arc<AtomicUsize>,
}

impl MemoryRasterSource {
    /// A source covering the whole globe with `tiers` resolution tiers.
    pub fn global(width: usize, height: usize, tiers: usize, bands: usize) -> Self {
        let mut tier_sizes = Vec::with_capacity(tiers.max(1));
        for t in 0..tiers.max(1) {
            tier_sizes.push(((width >> t).max(1), (height >> t).max(1)));
        }
        Self {
            size: (width, height),
            tier_sizes,
            bands,
            geo_transform: [
                -180.0,
                360.0 / width as f64,
                0.0,
                90.0,
                0.0,
                -180.0 / height as f64,
            ],
            uniform_value: None,
            last_read_tier: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// A global source where every sample has the same value.
    pub fn uniform(width: usize, height: usize, tiers: usize, bands: usize, value: u8) -> Self {
        let mut source = Self::global(width, height, tiers, bands);
        source.uniform_value = Some(value);
        source
    }

    /// A source covering only the given lat/lon rectangle (degrees).
    pub fn regional(
        width: usize,
        height: usize,
        tiers: usize,
        bands: usize,
        (min_lon, min_lat): (f64, f64),
        (max_lon, max_lat): (f64, f64),
    ) -> Self {
        let mut source = Self::global(width, height, tiers, bands);
        source.geo_transform = [
            min_lon,
            (max_lon - min_lon) / width as f64,
            0.0,
            max_lat,
            0.0,
            (min_lat - max_lat) / height as f64,
        ];
        source
    }

    /// Shared probe recording the tier of the most recent read.
    pub fn read_probe(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.last_read_tier)
    }

    fn sample(&self, tier: usize, x: i64, y: i64, band: usize) -> u8 {
        if let Some(value) = self.uniform_value {
            return value;
        }
        // Checkerboard in full-resolution coordinates, offset per band.
        let fx = x << tier;
        let fy = y << tier;
        let cell = (fx / 16 + fy / 16 + band as i64) % 2;
        if cell == 0 {
            32
        } else {
            224
        }
    }
}

impl RasterSource for MemoryRasterSource {
    fn raster_size(&self) -> (usize, usize) {
        self.size
    }

    fn band_count(&self) -> usize {
        self.bands
    }

    fn data_type(&self) -> TileDataType {
        TileDataType::UInt8
    }

    fn geo_transform(&self) -> [f64; 6] {
        self.geo_transform
    }

    fn tier_sizes(&self) -> &[(usize, usize)] {
        &self.tier_sizes
    }

    fn read_region(
        &self,
        tier: usize,
        band: usize,
        region: PixelRegion,
        out_size: (usize, usize),
    ) -> Result<Vec<u8>, DatasetError> {
        if tier >= self.tier_sizes.len() {
            return Err(DatasetError::NoSuchTier(tier));
        }
        if band >= self.bands {
            return Err(DatasetError::NoSuchBand(band));
        }
        self.last_read_tier.store(tier, Ordering::Relaxed);

        let (out_w, out_h) = out_size;
        let mut out = Vec::with_capacity(out_w * out_h);
        for oy in 0..out_h {
            let sy = region.start.1 + (oy as i64 * region.size.1) / out_h.max(1) as i64;
            for ox in 0..out_w {
                let sx = region.start.0 + (ox as i64 * region.size.0) / out_w.max(1) as i64;
                out.push(self.sample(tier, sx, sy, band));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_source_tiers_halve() {
        let source = MemoryRasterSource::global(1024, 512, 3, 1);
        assert_eq!(source.tier_sizes(), &[(1024, 512), (512, 256), (256, 128)]);
    }

    #[test]
    fn test_read_region_dimensions_and_determinism() {
        let source = MemoryRasterSource::global(256, 128, 1, 2);
        let region = PixelRegion::new((8, 8), (32, 32));
        let a = source.read_region(0, 0, region, (16, 16)).unwrap();
        let b = source.read_region(0, 0, region, (16, 16)).unwrap();
        assert_eq!(a.len(), 256);
        assert_eq!(a, b);

        let other_band = source.read_region(0, 1, region, (16, 16)).unwrap();
        assert_ne!(a, other_band);
    }

    #[test]
    fn test_read_probe_records_tier() {
        let source = MemoryRasterSource::global(256, 128, 2, 1);
        let probe = source.read_probe();
        let region = PixelRegion::new((0, 0), (16, 16));
        source.read_region(1, 0, region, (8, 8)).unwrap();
        assert_eq!(probe.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_out_of_range_tier_and_band() {
        let source = MemoryRasterSource::global(64, 32, 1, 1);
        let region = PixelRegion::new((0, 0), (8, 8));
        assert!(source.read_region(3, 0, region, (8, 8)).is_err());
        assert!(source.read_region(0, 2, region, (8, 8)).is_err());
    }
}
