//! Engine configuration.
//!
//! A [`GlobeConfig`] enumerates, per layer category, the `{name, filePath}`
//! dataset entries and the category parameters (minimum pixel size, worker
//! threads, cache capacity, request-queue flush interval, preprocessing).
//! Dataset locators may point at plain raster files, GDAL virtual-dataset
//! descriptors, or the JSON temporal/video wrapper formats.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DiskCacheMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One dataset entry within a layer category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LayerEntry {
    pub name: String,
    pub file_path: PathBuf,
}

/// Parameters shared by every provider of one layer category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryConfig {
    pub minimum_pixel_size: u32,
    pub threads: usize,
    pub cache_size: usize,
    pub frames_until_request_queue_flush: u32,
    pub preprocess_tiles: bool,
    pub layers: Vec<LayerEntry>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            minimum_pixel_size: 1024,
            threads: 1,
            cache_size: 500,
            frames_until_request_queue_flush: 60,
            preprocess_tiles: false,
            layers: Vec::new(),
        }
    }
}

impl CategoryConfig {
    fn sized(minimum_pixel_size: u32, preprocess_tiles: bool) -> Self {
        Self {
            minimum_pixel_size,
            preprocess_tiles,
            ..Default::default()
        }
    }
}

/// Per-category provider collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayersConfig {
    pub color: CategoryConfig,
    pub night: CategoryConfig,
    pub overlay: CategoryConfig,
    pub height: CategoryConfig,
    pub water: CategoryConfig,
}

impl Default for LayersConfig {
    fn default() -> Self {
        // Height maps are read small and preprocessed for min/max bounding
        // heights; water masks are usually low-frequency and read large.
        Self {
            color: CategoryConfig::sized(1024, false),
            night: CategoryConfig::sized(1024, false),
            overlay: CategoryConfig::sized(1024, false),
            height: CategoryConfig::sized(64, true),
            water: CategoryConfig::sized(2048, false),
        }
    }
}

/// Optional on-disk cache settings, shared by all layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiskCacheConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub mode: DiskCacheMode,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobeConfig {
    /// Level-of-detail scale factor; larger values subdivide deeper.
    pub lod_scale_factor: f64,
    /// Depth the quadtree roots are pre-split to at startup.
    pub initial_split_depth: u8,
    /// Hard ceiling on quadtree subdivision.
    pub max_quadtree_level: u8,
    pub disk_cache: Option<DiskCacheConfig>,
    pub layers: LayersConfig,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            lod_scale_factor: 10.0,
            initial_split_depth: 2,
            max_quadtree_level: 22,
            disk_cache: None,
            layers: LayersConfig::default(),
        }
    }
}

impl GlobeConfig {
    /// Loads a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
