//! Layer categories and the provider manager.
//!
//! Providers are grouped into five layer categories (color, night, overlay,
//! height, water), each built from configuration with its own category
//! parameters. Within a group only active layers are consulted; the first
//! configured layer of a category starts active, as the renderer composites
//! one base layer until the user toggles more.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheError, TileDiskCache};
use crate::config::GlobeConfig;
use crate::provider::{FrameContext, ProviderError, ProviderInitData, TileProvider, TileSource};
use crate::tile::{TileIndex, TileStatus};

/// The five layer categories, in composition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerCategory {
    Color = 0,
    Night = 1,
    Overlay = 2,
    Height = 3,
    Water = 4,
}

impl LayerCategory {
    pub const ALL: [LayerCategory; 5] = [
        LayerCategory::Color,
        LayerCategory::Night,
        LayerCategory::Overlay,
        LayerCategory::Height,
        LayerCategory::Water,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayerCategory::Color => "color",
            LayerCategory::Night => "night",
            LayerCategory::Overlay => "overlay",
            LayerCategory::Height => "height",
            LayerCategory::Water => "water",
        }
    }
}

/// Errors building the layer manager. Fatal: a globe without its configured
/// layers is a configuration problem, not a per-tile one.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("layer {name:?}: {source}")]
    Provider {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    DiskCache(#[from] CacheError),
}

/// One named provider registration.
pub struct Layer {
    name: String,
    provider: TileProvider,
    is_active: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>, provider: TileProvider, is_active: bool) -> Self {
        Self {
            name: name.into(),
            provider,
            is_active,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn provider(&self) -> &TileProvider {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut TileProvider {
        &mut self.provider
    }
}

/// The layers of one category.
#[derive(Default)]
pub struct LayerGroup {
    layers: Vec<Layer>,
}

impl LayerGroup {
    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn active_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.is_active)
    }

    pub fn active_layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut().filter(|l| l.is_active)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Height bounds for a chunk, derived from the height layer's tile
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingHeights {
    pub min: f32,
    pub max: f32,
    pub available: bool,
}

impl Default for BoundingHeights {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            available: false,
        }
    }
}

/// Owns the per-category provider collections.
pub struct LayerManager {
    groups: [LayerGroup; 5],
}

impl LayerManager {
    /// An empty manager; layers are added programmatically.
    pub fn new() -> Self {
        Self {
            groups: Default::default(),
        }
    }

    /// Builds all categories from configuration. The first layer of each
    /// category starts active. Fails on the first layer whose dataset
    /// locator is malformed or unreachable.
    pub fn from_config(config: &GlobeConfig) -> Result<Self, LayerError> {
        let disk_cache = match &config.disk_cache {
            Some(cfg) => Some((Arc::new(TileDiskCache::new(&cfg.root)?), cfg.mode)),
            None => None,
        };

        let mut manager = Self::new();
        for category in LayerCategory::ALL {
            let category_config = match category {
                LayerCategory::Color => &config.layers.color,
                LayerCategory::Night => &config.layers.night,
                LayerCategory::Overlay => &config.layers.overlay,
                LayerCategory::Height => &config.layers.height,
                LayerCategory::Water => &config.layers.water,
            };

            let init = ProviderInitData {
                minimum_pixel_size: category_config.minimum_pixel_size,
                threads: category_config.threads,
                cache_size: category_config.cache_size,
                frames_until_request_queue_flush: category_config
                    .frames_until_request_queue_flush,
                preprocess_tiles: category_config.preprocess_tiles,
                disk_cache: disk_cache.clone(),
            };

            for (i, entry) in category_config.layers.iter().enumerate() {
                let provider = TileProvider::from_locator(&entry.file_path, &init).map_err(
                    |source| LayerError::Provider {
                        name: entry.name.clone(),
                        source,
                    },
                )?;
                debug!(
                    category = category.name(),
                    layer = %entry.name,
                    active = i == 0,
                    "layer provider created"
                );
                manager
                    .group_mut(category)
                    .push(Layer::new(entry.name.clone(), provider, i == 0));
            }
        }

        info!(
            layers = manager.layer_count(),
            "layer manager built from configuration"
        );
        Ok(manager)
    }

    pub fn add_layer(&mut self, category: LayerCategory, layer: Layer) {
        self.group_mut(category).push(layer);
    }

    pub fn group(&self, category: LayerCategory) -> &LayerGroup {
        &self.groups[category as usize]
    }

    pub fn group_mut(&mut self, category: LayerCategory) -> &mut LayerGroup {
        &mut self.groups[category as usize]
    }

    pub fn layer_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Per-frame update: drains every active provider's finished loads into
    /// its cache. Never blocks.
    pub fn update(&mut self, ctx: &FrameContext) {
        for group in &mut self.groups {
            for layer in group.active_layers_mut() {
                layer.provider_mut().update(ctx);
            }
        }
    }

    pub fn reset(&mut self) {
        for group in &mut self.groups {
            for layer in &mut group.layers {
                layer.provider_mut().reset();
            }
        }
    }

    /// Cached tile status of the primary height layer, or `None` when no
    /// height layer is active. Read-only: never fires a load.
    pub fn height_status(&self, index: &TileIndex) -> Option<TileStatus> {
        self.group(LayerCategory::Height)
            .active_layers()
            .next()
            .map(|layer| layer.provider().tile_status(index))
    }

    /// Bounding heights for a chunk from the primary height layer's cached
    /// statistics, walking the ancestry for the nearest tile that has any.
    /// Read-only: never fires a load.
    pub fn bounding_heights(&self, index: &TileIndex) -> BoundingHeights {
        let Some(layer) = self.group(LayerCategory::Height).active_layers().next() else {
            return BoundingHeights::default();
        };
        let provider = layer.provider();
        let transform = provider.depth_transform();

        let mut walker = Some(*index);
        while let Some(current) = walker {
            if let Some(tile) = provider.cached_tile(&current) {
                if tile.is_ok() {
                    if let Some(meta) = &tile.metadata {
                        if let (Some(min), Some(max)) =
                            (meta.min_values.first(), meta.max_values.first())
                        {
                            return BoundingHeights {
                                min: min * transform.depth_scale + transform.depth_offset,
                                max: max * transform.depth_scale + transform.depth_offset,
                                available: true,
                            };
                        }
                    }
                }
            }
            walker = current.parent();
        }
        BoundingHeights::default()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}
