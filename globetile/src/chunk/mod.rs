//! Chunks: a quadtree node's geographic patch plus its per-frame
//! visibility and level decision.

mod evaluator;
mod node;

pub use evaluator::ChunkLevelEvaluator;
pub use node::ChunkNode;

use glam::DVec3;

use crate::camera::RenderView;
use crate::geodetic::{Ellipsoid, GeodeticPatch};
use crate::layer::LayerManager;
use crate::tile::TileIndex;

/// Outcome of a chunk's per-frame evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    WantMerge,
    WantSplit,
    DoNothing,
}

/// Read-only inputs for the per-frame chunk evaluation.
pub struct ChunkUpdateContext<'a> {
    pub view: &'a RenderView,
    pub ellipsoid: Ellipsoid,
    pub layers: &'a LayerManager,
    pub lod_scale_factor: f64,
    pub primary_evaluator: ChunkLevelEvaluator,
    pub max_quadtree_level: u8,
}

impl ChunkUpdateContext<'_> {
    /// Runs the evaluator chain: the primary view-dependent estimate,
    /// clamped down by data availability, then clamped into the engine's
    /// level range.
    pub fn desired_level(&self, chunk: &Chunk) -> i32 {
        let mut desired = self
            .primary_evaluator
            .desired_level(chunk, self)
            .unwrap_or(chunk.index().level as i32);

        if let Some(clamp) = ChunkLevelEvaluator::AvailableTileData.desired_level(chunk, self) {
            desired = desired.min(clamp);
        }

        desired.clamp(1, self.max_quadtree_level as i32)
    }
}

/// A quadtree node's geographic state: the patch, and visibility computed
/// during the last update.
#[derive(Debug, Clone)]
pub struct Chunk {
    index: TileIndex,
    surface_patch: GeodeticPatch,
    is_visible: bool,
}

impl Chunk {
    pub fn new(index: TileIndex) -> Self {
        Self {
            index,
            surface_patch: GeodeticPatch::from_index(&index),
            is_visible: true,
        }
    }

    pub fn index(&self) -> &TileIndex {
        &self.index
    }

    pub fn surface_patch(&self) -> &GeodeticPatch {
        &self.surface_patch
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    /// Evaluates visibility and the desired subdivision level, returning
    /// the split/merge wish for this frame. Chunks beyond the horizon ask
    /// to merge; the all-four hysteresis in the node decides whether they
    /// actually do.
    pub fn update(&mut self, ctx: &ChunkUpdateContext<'_>) -> ChunkStatus {
        let heights = ctx.layers.bounding_heights(&self.index);
        self.is_visible = !self.is_beyond_horizon(ctx, heights.max as f64);
        if !self.is_visible {
            return ChunkStatus::WantMerge;
        }

        let desired = ctx.desired_level(self);
        let current = self.index.level as i32;
        if desired > current {
            ChunkStatus::WantSplit
        } else if desired < current {
            ChunkStatus::WantMerge
        } else {
            ChunkStatus::DoNothing
        }
    }

    /// Horizon test against a sphere of the ellipsoid's minimum radius:
    /// the chunk is hidden when its closest point lies farther than the
    /// horizon distance plus the reach of its own bounding height.
    fn is_beyond_horizon(&self, ctx: &ChunkUpdateContext<'_>, object_height: f64) -> bool {
        let camera = ctx.view.camera_position_model_space();
        let minimum_radius = ctx.ellipsoid.minimum_radius();

        let camera_geodetic = ctx.ellipsoid.cartesian_to_geodetic(camera);
        let closest = self.surface_patch.closest_point(camera_geodetic);
        let object: DVec3 = ctx.ellipsoid.cartesian_surface_position(closest);

        let camera_distance_sq = camera.length_squared();
        let horizon_sq = (camera_distance_sq - minimum_radius * minimum_radius).max(0.0);
        let distance_to_horizon = horizon_sq.sqrt();

        let reach = minimum_radius + object_height.max(0.0);
        let object_reach_sq = (reach * reach - minimum_radius * minimum_radius).max(0.0);
        let max_distance_from_horizon = object_reach_sq.sqrt();

        let distance_to_object = (object - camera).length();
        distance_to_object > distance_to_horizon + max_distance_from_horizon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::RenderView;
    use crate::geodetic::Geodetic;
    use glam::DMat4;

    fn context<'a>(view: &'a RenderView, layers: &'a LayerManager) -> ChunkUpdateContext<'a> {
        ChunkUpdateContext {
            view,
            ellipsoid: Ellipsoid::WGS84,
            layers,
            lod_scale_factor: 10.0,
            primary_evaluator: ChunkLevelEvaluator::Distance,
            max_quadtree_level: 22,
        }
    }

    fn view_above(lat_deg: f64, lon_deg: f64, altitude: f64) -> RenderView {
        let surface = Ellipsoid::WGS84
            .cartesian_surface_position(Geodetic::from_degrees(lat_deg, lon_deg));
        let position = surface * (1.0 + altitude / surface.length());
        RenderView::new(position, DMat4::IDENTITY)
    }

    #[test]
    fn test_chunk_facing_camera_is_visible() {
        let layers = LayerManager::new();
        let view = view_above(10.0, -45.0, 500_000.0);
        let ctx = context(&view, &layers);

        // Level-3 chunk containing (10 N, 45 W).
        let mut chunk = Chunk::new(TileIndex::new(6, 3, 3));
        chunk.update(&ctx);
        assert!(chunk.is_visible());
    }

    #[test]
    fn test_antipodal_chunk_is_culled_and_wants_merge() {
        let layers = LayerManager::new();
        let view = view_above(10.0, -45.0, 500_000.0);
        let ctx = context(&view, &layers);

        // The antipode (-10 S, 135 E) is far beyond the horizon.
        let mut chunk = Chunk::new(TileIndex::new(14, 4, 3));
        let status = chunk.update(&ctx);
        assert!(!chunk.is_visible());
        assert_eq!(status, ChunkStatus::WantMerge);
    }

    #[test]
    fn test_near_camera_chunk_wants_split() {
        let layers = LayerManager::new();
        // Low altitude: the distance evaluator asks for a deep level.
        let view = view_above(0.0, -90.0, 10_000.0);
        let ctx = context(&view, &layers);

        let mut chunk = Chunk::new(TileIndex::new(1, 0, 1));
        assert_eq!(chunk.update(&ctx), ChunkStatus::WantSplit);
    }

    #[test]
    fn test_far_camera_deep_chunk_wants_merge() {
        let layers = LayerManager::new();
        // Very high altitude: deep chunks are overkill.
        let view = view_above(0.0, -90.0, 50_000_000.0);
        let ctx = context(&view, &layers);

        let mut chunk = Chunk::new(TileIndex::new(128, 64, 8));
        assert_eq!(chunk.update(&ctx), ChunkStatus::WantMerge);
    }
}
