//! End-to-end selection against a live caching provider: asynchronous
//! loads, ancestor fallback, and level clamping across frames.

use std::time::{Duration, Instant};

use globetile::dataset::{DatasetConfig, MemoryRasterSource, RasterDataset};
use globetile::provider::{CachingTileProvider, ProviderInitData};
use globetile::selector;
use globetile::tile::{TileIndex, TileStatus};

/// 2048 px across 360 degrees with a 128 px minimum read: the dataset
/// serves full quality down to chunk level 3.
fn provider() -> CachingTileProvider {
    let dataset = RasterDataset::new(
        Box::new(MemoryRasterSource::global(2048, 1024, 3, 1)),
        DatasetConfig {
            minimum_pixel_size: 128,
            preprocess_tiles: true,
        },
    )
    .unwrap();
    CachingTileProvider::from_dataset(
        dataset,
        &ProviderInitData {
            minimum_pixel_size: 128,
            preprocess_tiles: true,
            ..Default::default()
        },
    )
    .unwrap()
}

fn pump_until<F: FnMut(&mut CachingTileProvider) -> bool>(
    provider: &mut CachingTileProvider,
    mut done: F,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done(provider) {
        provider.update();
        assert!(Instant::now() < deadline, "condition never reached");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn selection_falls_back_then_sharpens_over_frames() {
    let mut p = provider();
    let index = TileIndex::new(5, 3, 3);

    // Frame 0: nothing cached; selection bottoms out unavailable but the
    // walk itself fired loads for the whole ancestry.
    let first = selector::highest_resolution_tile(&mut p, index, 0);
    assert_eq!(first.tile.status, TileStatus::Unavailable);

    // Later frames: the exact tile eventually lands in the cache and
    // selection returns it with an identity transform.
    pump_until(&mut p, |p| {
        selector::highest_resolution_tile(p, index, 0)
            .tile
            .is_ok()
    });
    let sharp = selector::highest_resolution_tile(&mut p, index, 0);
    assert_eq!(sharp.uv_transform.uv_scale.x, 1.0);
    assert!(sharp.tile.metadata.is_some());
}

#[test]
fn requests_beyond_max_level_resolve_from_deepest_tier() {
    let mut p = provider();
    assert_eq!(p.max_level(), 3);

    // A level-4 request clamps to its level-3 parent instead of erroring.
    let deep = TileIndex::new(3, 2, 4);
    pump_until(&mut p, |p| {
        selector::highest_resolution_tile(p, deep, 0).tile.is_ok()
    });
    let resolved = selector::highest_resolution_tile(&mut p, deep, 0);
    assert_eq!(resolved.tile.status, TileStatus::Ok);
    // One ascension: the level-4 chunk samples a quarter of the level-3
    // tile.
    assert_eq!(resolved.uv_transform.uv_scale.x, 0.5);
    // (3, 2) is an east, north child.
    assert_eq!(resolved.uv_transform.uv_offset.x, 0.5);
    assert_eq!(resolved.uv_transform.uv_offset.y, 0.5);
}

#[test]
fn pile_is_fully_populated_before_and_after_loading() {
    let mut p = provider();
    let index = TileIndex::new(5, 3, 3);

    // Before anything loads the pile falls back to the default tile.
    let cold = selector::highest_resolution_tile_pile(&mut p, index, 3);
    assert_eq!(cold.chunk_tiles.len(), 3);
    assert!(cold.chunk_tiles.iter().all(|c| c.tile.is_ok()));

    pump_until(&mut p, |p| {
        selector::highest_resolution_tile(p, index, 0).tile.is_ok()
    });
    // Warm: the first entry is the exact tile, coarser entries are real
    // ancestors once they load too.
    pump_until(&mut p, |p| {
        let pile = selector::highest_resolution_tile_pile(p, index, 3);
        pile.chunk_tiles[0].uv_transform.uv_scale.x == 1.0
            && pile.chunk_tiles[1].uv_transform.uv_scale.x == 0.5
    });
}

#[test]
fn coalescing_bounds_outstanding_requests() {
    let mut p = provider();
    // Selection for two adjacent indices walks overlapping ancestries; the
    // enqueue criteria keep one in-flight request per (level, location).
    selector::highest_resolution_tile(&mut p, TileIndex::new(5, 3, 3), 0);
    selector::highest_resolution_tile(&mut p, TileIndex::new(6, 3, 3), 0);
    // The first walk fires requests at levels 3 and 2; the second walk's
    // indices are all within one grid step of those and coalesce away.
    assert_eq!(p.outstanding_requests(), 2);
}
