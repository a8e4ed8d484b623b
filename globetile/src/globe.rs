//! The chunked-LOD globe: ties the layer manager, the quadtree roots and
//! the evaluator chain into the per-frame control flow.
//!
//! Each frame, `update` drains every active provider (making last frame's
//! loads visible), then recomputes desired levels and applies splits and
//! merges. `render_chunks` walks the leaves and runs tile selection per
//! active layer; cache misses enqueue loads that surface on a later frame.
//! Nothing on this path blocks.

use chrono::{DateTime, Utc};
use tracing::{debug, info_span};

use crate::camera::RenderView;
use crate::chunk::{Chunk, ChunkLevelEvaluator, ChunkNode, ChunkUpdateContext};
use crate::config::GlobeConfig;
use crate::geodetic::{Ellipsoid, GeodeticPatch};
use crate::layer::{LayerCategory, LayerError, LayerManager};
use crate::provider::FrameContext;
use crate::selector;
use crate::tile::{ChunkTile, TileIndex};

/// Per-leaf, per-layer selection results handed to the renderer.
pub struct ChunkRenderData {
    pub index: TileIndex,
    pub patch: GeodeticPatch,
    /// For each category with active layers: the chunk tiles sorted by
    /// descending resolution, ready for compositing.
    pub layer_tiles: Vec<(LayerCategory, Vec<ChunkTile>)>,
}

/// Counters exposed after each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobeStats {
    pub frame: u64,
    pub leaf_count: usize,
    pub visible_leaves: usize,
    pub max_depth: u8,
}

/// Owns the quadtree (two hemisphere roots), the layers and the LOD policy.
pub struct ChunkedGlobe {
    ellipsoid: Ellipsoid,
    layers: LayerManager,
    west_root: ChunkNode,
    east_root: ChunkNode,
    lod_scale_factor: f64,
    primary_evaluator: ChunkLevelEvaluator,
    max_quadtree_level: u8,
    frame: u64,
}

impl ChunkedGlobe {
    /// Builds the globe from configuration; fails when any configured layer
    /// cannot be constructed.
    pub fn new(config: &GlobeConfig) -> Result<Self, LayerError> {
        let layers = LayerManager::from_config(config)?;
        Ok(Self::with_layers(config, layers))
    }

    /// Builds the globe around an already-populated layer manager.
    pub fn with_layers(config: &GlobeConfig, layers: LayerManager) -> Self {
        let mut west_root = ChunkNode::new(Chunk::new(TileIndex::new(0, 0, 0)));
        let mut east_root = ChunkNode::new(Chunk::new(TileIndex::new(1, 0, 0)));
        west_root.split(config.initial_split_depth);
        east_root.split(config.initial_split_depth);

        Self {
            ellipsoid: Ellipsoid::WGS84,
            layers,
            west_root,
            east_root,
            lod_scale_factor: config.lod_scale_factor,
            primary_evaluator: ChunkLevelEvaluator::Distance,
            max_quadtree_level: config.max_quadtree_level,
            frame: 0,
        }
    }

    pub fn set_primary_evaluator(&mut self, evaluator: ChunkLevelEvaluator) {
        self.primary_evaluator = evaluator;
    }

    pub fn layer_manager(&self) -> &LayerManager {
        &self.layers
    }

    pub fn layer_manager_mut(&mut self) -> &mut LayerManager {
        &mut self.layers
    }

    /// Advances one frame: drains async loads into the caches, then
    /// recomputes desired levels bottom-up and applies splits and merges.
    pub fn update(&mut self, view: &RenderView, time: DateTime<Utc>) {
        self.frame += 1;
        let span = info_span!("globe_update", frame = self.frame);
        let _guard = span.enter();

        let ctx = FrameContext {
            time,
            frame: self.frame,
        };
        self.layers.update(&ctx);

        let update_ctx = ChunkUpdateContext {
            view,
            ellipsoid: self.ellipsoid,
            layers: &self.layers,
            lod_scale_factor: self.lod_scale_factor,
            primary_evaluator: self.primary_evaluator,
            max_quadtree_level: self.max_quadtree_level,
        };
        let mut decide = |chunk: &mut Chunk| chunk.update(&update_ctx);
        self.west_root.update_chunk_tree(&mut decide);
        self.east_root.update_chunk_tree(&mut decide);
    }

    /// Runs tile selection for every visible leaf and every category with
    /// active layers. Misses enqueue loads; the returned tiles are whatever
    /// is renderable right now.
    pub fn render_chunks(&mut self) -> Vec<ChunkRenderData> {
        let mut visible: Vec<(TileIndex, GeodeticPatch)> = Vec::new();
        let mut collect = |chunk: &Chunk| {
            if chunk.is_visible() {
                visible.push((*chunk.index(), *chunk.surface_patch()));
            }
        };
        self.west_root.for_each_leaf(&mut collect);
        self.east_root.for_each_leaf(&mut collect);

        let mut out = Vec::with_capacity(visible.len());
        for (index, patch) in visible {
            let mut layer_tiles = Vec::new();
            for category in LayerCategory::ALL {
                let group = self.layers.group_mut(category);
                if group.active_layers_mut().next().is_none() {
                    continue;
                }
                let tiles = selector::tiles_sorted_by_highest_resolution(group, index);
                layer_tiles.push((category, tiles));
            }
            out.push(ChunkRenderData {
                index,
                patch,
                layer_tiles,
            });
        }
        debug!(chunks = out.len(), "render chunk lists produced");
        out
    }

    /// Collapses the quadtree and drops all cached tiles and pending
    /// requests.
    pub fn reset(&mut self) {
        self.west_root.merge();
        self.east_root.merge();
        self.layers.reset();
    }

    pub fn stats(&self) -> GlobeStats {
        let mut visible = 0usize;
        let mut count_visible = |chunk: &Chunk| {
            if chunk.is_visible() {
                visible += 1;
            }
        };
        self.west_root.for_each_leaf(&mut count_visible);
        self.east_root.for_each_leaf(&mut count_visible);

        GlobeStats {
            frame: self.frame,
            leaf_count: self.west_root.leaf_count() + self.east_root.leaf_count(),
            visible_leaves: visible,
            max_depth: self.west_root.max_depth().max(self.east_root.max_depth()),
        }
    }
}
