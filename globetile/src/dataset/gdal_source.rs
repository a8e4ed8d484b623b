//! GDAL-backed raster source.
//!
//! Opens any raster GDAL can read (GeoTIFF, VRT descriptors, WMS XML, ...)
//! in read-only mode and exposes it through the [`RasterSource`] seam. One
//! `GdalRasterSource` is owned by exactly one dataset worker pool; the GDAL
//! dataset handle is not assumed safe for concurrent reads.

use std::path::{Path, PathBuf};

use gdal::raster::{GdalDataType, ResampleAlg};
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use tracing::debug;

use super::region::PixelRegion;
use super::source::RasterSource;
use super::DatasetError;
use crate::tile::TileDataType;

/// A read-only GDAL dataset with its overview table computed at open time.
pub struct GdalRasterSource {
    dataset: Dataset,
    path: PathBuf,
    size: (usize, usize),
    bands: usize,
    data_type: TileDataType,
    geo_transform: [f64; 6],
    tier_sizes: Vec<(usize, usize)>,
    no_data: Option<f64>,
    scale_offset: (f64, f64),
}

impl GdalRasterSource {
    /// Opens `path` read-only and computes the tier table and band layout.
    pub fn open(path: &Path) -> Result<Self, DatasetError> {
        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_RASTER,
            ..Default::default()
        };
        let dataset =
            Dataset::open_ex(path, options).map_err(|source| DatasetError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let size = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(DatasetError::NoRasterBands(path.to_path_buf()));
        }

        let geo_transform = dataset
            .geo_transform()
            .map_err(|_| DatasetError::MissingGeoTransform(path.to_path_buf()))?;

        let first = dataset
            .rasterband(1)
            .map_err(DatasetError::Read)?;
        let data_type = convert_data_type(first.band_type())?;

        let mut tier_sizes = vec![size];
        let overview_count = first.overview_count().map_err(DatasetError::Read)?;
        for i in 0..overview_count {
            let overview = first.overview(i as usize).map_err(DatasetError::Read)?;
            tier_sizes.push(overview.size());
        }

        let no_data = first.no_data_value();
        let scale_offset = (first.scale().unwrap_or(1.0), first.offset().unwrap_or(0.0));

        debug!(
            path = %path.display(),
            width = size.0,
            height = size.1,
            bands,
            tiers = tier_sizes.len(),
            "opened raster dataset"
        );

        Ok(Self {
            dataset,
            path: path.to_path_buf(),
            size,
            bands,
            data_type,
            geo_transform,
            tier_sizes,
            no_data,
            scale_offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RasterSource for GdalRasterSource {
    fn raster_size(&self) -> (usize, usize) {
        self.size
    }

    fn band_count(&self) -> usize {
        self.bands
    }

    fn data_type(&self) -> TileDataType {
        self.data_type
    }

    fn geo_transform(&self) -> [f64; 6] {
        self.geo_transform
    }

    fn tier_sizes(&self) -> &[(usize, usize)] {
        &self.tier_sizes
    }

    fn no_data_value(&self) -> Option<f64> {
        self.no_data
    }

    fn scale_offset(&self) -> (f64, f64) {
        self.scale_offset
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

        let base = self
            .dataset
            .rasterband(band + 1)
            .map_err(DatasetError::Read)?;
        let band = if tier == 0 {
            base
        } else {
            base.overview(tier - 1).map_err(DatasetError::Read)?
        };

        let window = (region.start.0 as isize, region.start.1 as isize);
        let window_size = (region.size.0 as usize, region.size.1 as usize);
        let resample = Some(ResampleAlg::NearestNeighbour);

        macro_rules! read_typed {
            ($t:ty) => {{
                let buffer = band
                    .read_as::<$t>(window, window_size, out_size, resample)
                    .map_err(DatasetError::Read)?;
                Ok(samples_to_bytes(buffer.data()))
            }};
        }

        match self.data_type {
            TileDataType::UInt8 => read_typed!(u8),
            TileDataType::UInt16 => read_typed!(u16),
            TileDataType::Int16 => read_typed!(i16),
            TileDataType::UInt32 => read_typed!(u32),
            TileDataType::Int32 => read_typed!(i32),
            TileDataType::Float32 => read_typed!(f32),
            TileDataType::Float64 => read_typed!(f64),
        }
    }
}

fn convert_data_type(gdal_type: GdalDataType) -> Result<TileDataType, DatasetError> {
    match gdal_type {
        GdalDataType::UInt8 => Ok(TileDataType::UInt8),
        GdalDataType::UInt16 => Ok(TileDataType::UInt16),
        GdalDataType::Int16 => Ok(TileDataType::Int16),
        GdalDataType::UInt32 => Ok(TileDataType::UInt32),
        GdalDataType::Int32 => Ok(TileDataType::Int32),
        GdalDataType::Float32 => Ok(TileDataType::Float32),
        GdalDataType::Float64 => Ok(TileDataType::Float64),
        other => Err(DatasetError::UnsupportedDataType(format!("{other:?}"))),
    }
}

trait Sample: Copy {
    fn push_ne_bytes(self, out: &mut Vec<u8>);
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(impl Sample for $t {
            fn push_ne_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }
        })*
    };
}

impl_sample!(u8, u16, i16, u32, i32, f32, f64);

fn samples_to_bytes<T: Sample>(samples: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(std::mem::size_of::<T>() * samples.len());
    for &sample in samples {
        sample.push_ne_bytes(&mut out);
    }
    out
}
