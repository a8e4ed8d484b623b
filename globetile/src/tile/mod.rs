//! Tile data model: status, decoded raster handle, UV transforms and the
//! per-draw chunk-tile pairing produced by selection.
//!
//! A [`Tile`] is immutable once produced by a dataset read. The decoded
//! pixel buffer is a [`Bytes`] handle, so the cache, the renderer and any
//! in-flight draw can share one allocation; evicting a tile from the cache
//! drops one reference and the buffer survives until the last clone is gone.

mod index;

pub use index::{TileHashKey, TileIndex};

use bytes::Bytes;
use glam::DVec2;
use std::sync::Arc;

/// Outcome of producing a tile, surfaced to the selector and renderer.
///
/// Per-tile I/O problems are never raised as errors; they degrade to one of
/// these states and the selector falls back to an ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    /// Not in the cache (yet); a load may be in flight.
    Unavailable,
    /// The requested region lies outside the dataset extent.
    OutOfRange,
    /// The read or decode failed.
    IoError,
    /// Decoded data is ready for use.
    Ok,
}

/// Sample type of a decoded tile buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileDataType {
    UInt8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl TileDataType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            TileDataType::UInt8 => 1,
            TileDataType::UInt16 | TileDataType::Int16 => 2,
            TileDataType::UInt32 | TileDataType::Int32 | TileDataType::Float32 => 4,
            TileDataType::Float64 => 8,
        }
    }
}

/// Byte layout of a decoded tile: sample type and band interleaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDataLayout {
    pub data_type: TileDataType,
    /// Number of raster bands, stored band-sequential in the buffer.
    pub bands: usize,
}

impl TileDataLayout {
    pub fn new(data_type: TileDataType, bands: usize) -> Self {
        Self { data_type, bands }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.data_type.bytes_per_sample() * self.bands
    }
}

/// Per-band minimum/maximum statistics computed when a dataset is configured
/// to preprocess tiles. Height layers use these as bounding heights.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMetaData {
    pub min_values: Vec<f32>,
    pub max_values: Vec<f32>,
}

/// Decoded raster data for one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRaster {
    /// Band-sequential sample data.
    pub pixels: Bytes,
    /// Width and height in pixels, including any border padding.
    pub dimensions: (u32, u32),
    pub layout: TileDataLayout,
}

/// Decoded raster data plus status for one chunk at one level.
///
/// Cheap to clone: the pixel buffer and metadata are shared handles.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub status: TileStatus,
    pub raster: Option<TileRaster>,
    pub metadata: Option<Arc<TileMetaData>>,
}

impl Tile {
    /// The canonical cache-miss tile.
    pub const UNAVAILABLE: Tile = Tile {
        status: TileStatus::Unavailable,
        raster: None,
        metadata: None,
    };

    pub fn with_status(status: TileStatus) -> Self {
        Tile {
            status,
            raster: None,
            metadata: None,
        }
    }

    /// A small single-color tile, used as the explicit default of a provider
    /// when nothing has loaded yet.
    pub fn solid(value: u8, layout: TileDataLayout) -> Self {
        const SIDE: usize = 16;
        let pixels = vec![value; SIDE * SIDE * layout.bytes_per_pixel()];
        Tile {
            status: TileStatus::Ok,
            raster: Some(TileRaster {
                pixels: Bytes::from(pixels),
                dimensions: (SIDE as u32, SIDE as u32),
                layout,
            }),
            metadata: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == TileStatus::Ok
    }
}

/// Which sub-rectangle of a (possibly ancestor) tile to sample: offset and
/// scale in texture coordinates, v pointing north.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileUvTransform {
    pub uv_offset: DVec2,
    pub uv_scale: DVec2,
}

impl TileUvTransform {
    /// Identity transform covering the whole tile.
    pub const IDENTITY: TileUvTransform = TileUvTransform {
        uv_offset: DVec2::ZERO,
        uv_scale: DVec2::ONE,
    };

    /// Rewrites the transform to address the same region from the parent of
    /// `index`: halve offset and scale, then shift along the axes whose
    /// positive half the child occupies (east/north).
    pub fn ascend(&mut self, index: &TileIndex) {
        self.uv_offset *= 0.5;
        self.uv_scale *= 0.5;
        if index.is_east_child() {
            self.uv_offset.x += 0.5;
        }
        if index.is_north_child() {
            self.uv_offset.y += 0.5;
        }
    }
}

/// A tile paired with the UV transform needed to sample it for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTile {
    pub tile: Tile,
    pub uv_transform: TileUvTransform,
}

impl ChunkTile {
    pub fn unavailable() -> Self {
        ChunkTile {
            tile: Tile::UNAVAILABLE,
            uv_transform: TileUvTransform::IDENTITY,
        }
    }
}

/// An ordered chain of increasingly coarse chunk tiles for multi-tap
/// sampling; entry 0 is the sharpest.
#[derive(Debug, Clone, Default)]
pub struct ChunkTilePile {
    pub chunk_tiles: Vec<ChunkTile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodetic::Quad;

    #[test]
    fn test_layout_bytes_per_pixel() {
        let layout = TileDataLayout::new(TileDataType::UInt8, 3);
        assert_eq!(layout.bytes_per_pixel(), 3);
        let layout = TileDataLayout::new(TileDataType::Float32, 1);
        assert_eq!(layout.bytes_per_pixel(), 4);
    }

    #[test]
    fn test_solid_tile_is_ok_and_filled() {
        let tile = Tile::solid(127, TileDataLayout::new(TileDataType::UInt8, 4));
        assert!(tile.is_ok());
        let raster = tile.raster.unwrap();
        assert_eq!(raster.dimensions, (16, 16));
        assert_eq!(raster.pixels.len(), 16 * 16 * 4);
        assert!(raster.pixels.iter().all(|&b| b == 127));
    }

    #[test]
    fn test_ascend_from_north_east_child() {
        let parent = TileIndex::new(1, 1, 2);
        let child = parent.child(Quad::NorthEast);
        let mut uv = TileUvTransform::IDENTITY;
        uv.ascend(&child);
        assert_eq!(uv.uv_scale, DVec2::splat(0.5));
        assert_eq!(uv.uv_offset, DVec2::new(0.5, 0.5));
    }

    #[test]
    fn test_ascend_from_south_west_child() {
        let parent = TileIndex::new(1, 1, 2);
        let child = parent.child(Quad::SouthWest);
        let mut uv = TileUvTransform::IDENTITY;
        uv.ascend(&child);
        assert_eq!(uv.uv_scale, DVec2::splat(0.5));
        assert_eq!(uv.uv_offset, DVec2::ZERO);
    }

    #[test]
    fn test_two_ascensions_compose() {
        // level-2 tile (3, 1): NE child of (1, 0), which is SE child of (0, 0)
        let index = TileIndex::new(3, 1, 2);
        let mut uv = TileUvTransform::IDENTITY;
        let mut walker = index;
        while let Some(parent) = walker.parent() {
            uv.ascend(&walker);
            walker = parent;
        }
        // (3,1,2) is the south-east child of (1,0,1), which is the
        // north-east child of the west root: offset (0.75, 0.5), scale 0.25.
        assert!((uv.uv_scale.x - 0.25).abs() < 1e-12);
        assert!((uv.uv_offset.x - 0.75).abs() < 1e-12);
        assert!((uv.uv_offset.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tile_clone_shares_pixels() {
        let tile = Tile::solid(1, TileDataLayout::new(TileDataType::UInt8, 1));
        let clone = tile.clone();
        let a = tile.raster.as_ref().unwrap().pixels.as_ptr();
        let b = clone.raster.as_ref().unwrap().pixels.as_ptr();
        assert_eq!(a, b);
    }
}
