//! Whole-engine integration: configuration, layer manager, quadtree
//! updates and per-frame render lists working together over synthetic
//! datasets.

use std::time::{Duration, Instant};

use chrono::Utc;
use glam::DMat4;
use globetile::camera::RenderView;
use globetile::config::GlobeConfig;
use globetile::dataset::{DatasetConfig, MemoryRasterSource, RasterDataset};
use globetile::geodetic::{Ellipsoid, Geodetic};
use globetile::globe::ChunkedGlobe;
use globetile::layer::{Layer, LayerCategory, LayerManager};
use globetile::provider::{CachingTileProvider, ProviderInitData, TileProvider};
use globetile::tile::TileStatus;

fn memory_provider(minimum_pixel_size: u32, preprocess: bool) -> TileProvider {
    let dataset = RasterDataset::new(
        Box::new(MemoryRasterSource::global(4096, 2048, 4, 1)),
        DatasetConfig {
            minimum_pixel_size,
            preprocess_tiles: preprocess,
        },
    )
    .unwrap();
    TileProvider::Caching(
        CachingTileProvider::from_dataset(
            dataset,
            &ProviderInitData {
                minimum_pixel_size,
                preprocess_tiles: preprocess,
                ..Default::default()
            },
        )
        .unwrap(),
    )
}

fn test_globe() -> ChunkedGlobe {
    let mut layers = LayerManager::new();
    layers.add_layer(
        LayerCategory::Color,
        Layer::new("base color", memory_provider(64, false), true),
    );
    layers.add_layer(
        LayerCategory::Height,
        Layer::new("terrain", memory_provider(32, true), true),
    );
    ChunkedGlobe::with_layers(&GlobeConfig::default(), layers)
}

fn view_at(lat_deg: f64, lon_deg: f64, altitude: f64) -> RenderView {
    let surface =
        Ellipsoid::WGS84.cartesian_surface_position(Geodetic::from_degrees(lat_deg, lon_deg));
    let position = surface * (1.0 + altitude / surface.length());
    RenderView::new(position, DMat4::IDENTITY)
}

#[test]
fn frame_loop_converges_to_renderable_tiles() {
    let mut globe = test_globe();
    let view = view_at(10.0, 30.0, 3_000_000.0);

    let deadline = Instant::now() + Duration::from_secs(15);
    let mut renderable = 0usize;
    while renderable == 0 {
        globe.update(&view, Utc::now());
        renderable = globe
            .render_chunks()
            .iter()
            .flat_map(|c| c.layer_tiles.iter())
            .flat_map(|(_, tiles)| tiles.iter())
            .filter(|t| t.tile.status == TileStatus::Ok)
            .count();
        assert!(Instant::now() < deadline, "no tile became renderable");
        std::thread::sleep(Duration::from_millis(2));
    }

    // Both categories produce per-leaf entries for visible chunks.
    let chunks = globe.render_chunks();
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        let categories: Vec<LayerCategory> =
            chunk.layer_tiles.iter().map(|(c, _)| *c).collect();
        assert_eq!(categories, vec![LayerCategory::Color, LayerCategory::Height]);
    }
}

#[test]
fn descending_camera_deepens_then_receding_camera_prunes() {
    let mut globe = test_globe();

    // Descend: the tree must grow beyond the initial split depth.
    let near = view_at(0.0, -45.0, 100_000.0);
    for _ in 0..10 {
        globe.update(&near, Utc::now());
    }
    let deep_stats = globe.stats();
    assert!(deep_stats.max_depth > 2);
    let deep_leaves = deep_stats.leaf_count;

    // Recede far out: unanimous merge wishes collapse the fine chunks,
    // four at a time per pass.
    let far = view_at(0.0, -45.0, 40_000_000.0);
    for _ in 0..30 {
        globe.update(&far, Utc::now());
    }
    let pruned = globe.stats();
    assert!(pruned.leaf_count < deep_leaves);
    assert!(pruned.max_depth < deep_stats.max_depth);
}

#[test]
fn far_side_chunks_are_culled_from_render_lists() {
    let mut globe = test_globe();
    let view = view_at(0.0, 0.0, 1_000_000.0);
    for _ in 0..3 {
        globe.update(&view, Utc::now());
    }

    let chunks = globe.render_chunks();
    assert!(!chunks.is_empty());
    // No rendered chunk may live entirely on the far side of the globe
    // (longitude band around the antipode at 180 E).
    for chunk in &chunks {
        let min_lon = chunk.patch.min_lon().to_degrees();
        assert!(
            !(150.0..=180.0).contains(&min_lon) || chunk.patch.max_lat().to_degrees() > 80.0,
            "antipodal chunk {:?} was not culled",
            chunk.index
        );
    }
}

#[test]
fn reset_returns_to_two_root_leaves() {
    let mut globe = test_globe();
    let view = view_at(0.0, -45.0, 100_000.0);
    for _ in 0..5 {
        globe.update(&view, Utc::now());
    }
    assert!(globe.stats().leaf_count > 2);

    globe.reset();
    let stats = globe.stats();
    assert_eq!(stats.leaf_count, 2);
    assert_eq!(stats.max_depth, 0);
}
