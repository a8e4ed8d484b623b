//! Chunk level evaluators: strategies computing a desired subdivision level
//! from camera distance, projected area, or data availability.

use glam::DVec3;

use super::{Chunk, ChunkUpdateContext};
use crate::geodetic::{Geodetic, Geodetic3};
use crate::tile::TileStatus;

/// The evaluator strategies. `Distance` and `ProjectedArea` are alternative
/// primary estimates; `AvailableTileData` only ever clamps the result down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLevelEvaluator {
    /// Finer as the camera approaches:
    /// `ceil(log2(scale_factor / (distance_to_patch - min_height)))`.
    Distance,
    /// Projected-solid-angle estimate yielding an adjustment relative to the
    /// chunk's current level; robust for large, strongly curved patches.
    ProjectedArea,
    /// Steps the level down by one while the primary height layer reports
    /// missing data for this chunk.
    AvailableTileData,
}

impl ChunkLevelEvaluator {
    /// The desired level for `chunk`, or `None` when this evaluator has no
    /// opinion (availability with healthy data, or no height layer at all).
    pub fn desired_level(&self, chunk: &Chunk, ctx: &ChunkUpdateContext<'_>) -> Option<i32> {
        match self {
            ChunkLevelEvaluator::Distance => Some(desired_level_by_distance(chunk, ctx)),
            ChunkLevelEvaluator::ProjectedArea => {
                Some(desired_level_by_projected_area(chunk, ctx))
            }
            ChunkLevelEvaluator::AvailableTileData => {
                desired_level_by_available_data(chunk, ctx)
            }
        }
    }
}

fn desired_level_by_distance(chunk: &Chunk, ctx: &ChunkUpdateContext<'_>) -> i32 {
    let ellipsoid = &ctx.ellipsoid;
    let camera = ctx.view.camera_position_model_space();

    let camera_geodetic = ellipsoid.cartesian_to_geodetic(camera);
    let point_on_patch = chunk.surface_patch().closest_point(camera_geodetic);
    let heights = ctx.layers.bounding_heights(chunk.index());

    let patch_position = ellipsoid.cartesian_surface_position(point_on_patch);
    let distance_to_patch = (patch_position - camera).length();
    let distance = (distance_to_patch - heights.min as f64).max(1.0);

    let scale_factor = ctx.lod_scale_factor * ellipsoid.minimum_radius();
    let projected_scale_factor = scale_factor / distance;
    projected_scale_factor.log2().ceil() as i32
}

fn desired_level_by_projected_area(chunk: &Chunk, ctx: &ChunkUpdateContext<'_>) -> i32 {
    let ellipsoid = &ctx.ellipsoid;
    let camera = ctx.view.camera_position_model_space();
    let camera_to_center = -camera;
    let camera_geodetic = ellipsoid.cartesian_to_geodetic(camera);

    // A small triangle near the camera-closest corner stands in for the
    // whole patch; extrapolating it by 8 handles patches too curved for a
    // flat-quad estimate.
    let patch = chunk.surface_patch();
    let center = patch.center();
    let closest_corner = patch.closest_corner(camera_geodetic);
    let heights = ctx.layers.bounding_heights(chunk.index());
    let min_height = heights.min as f64;

    let c0 = Geodetic3 {
        geodetic: closest_corner,
        height: min_height,
    };
    let c1 = Geodetic3 {
        geodetic: Geodetic::new(center.lat, closest_corner.lon),
        height: min_height,
    };
    let c2 = Geodetic3 {
        geodetic: Geodetic::new(closest_corner.lat, center.lon),
        height: min_height,
    };

    // Project onto the unit sphere around the camera.
    let a: DVec3 = (camera_to_center + ellipsoid.cartesian_position(c0)).normalize();
    let b: DVec3 = (camera_to_center + ellipsoid.cartesian_position(c1)).normalize();
    let c: DVec3 = (camera_to_center + ellipsoid.cartesian_position(c2)).normalize();

    let ab = b - a;
    let ac = c - a;
    let area_abc = 0.5 * ac.cross(ab).length();
    let projected_chunk_area_approx = 8.0 * area_abc;

    let scaled_area = ctx.lod_scale_factor * projected_chunk_area_approx;
    chunk.index().level as i32 + (scaled_area - 1.0).round() as i32
}

fn desired_level_by_available_data(chunk: &Chunk, ctx: &ChunkUpdateContext<'_>) -> Option<i32> {
    let current = chunk.index().level as i32;
    match ctx.layers.height_status(chunk.index()) {
        Some(TileStatus::IoError) | Some(TileStatus::OutOfRange) => Some(current - 1),
        _ => None,
    }
}
