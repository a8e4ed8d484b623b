//! Tile selection: find the highest-resolution *available* tile for an
//! index by walking up the quadtree ancestry, accumulating the UV transform
//! that addresses the original patch inside the ancestor tile.
//!
//! Selection guarantees the renderer a usable (or explicitly unavailable)
//! tile every frame at worst-case cost proportional to tree depth; it never
//! waits on I/O.

use tracing::trace;

use crate::layer::LayerGroup;
use crate::provider::TileSource;
use crate::tile::{ChunkTile, ChunkTilePile, TileIndex, TileStatus, TileUvTransform};

fn ascend_to_parent(index: &mut TileIndex, uv: &mut TileUvTransform) {
    uv.ascend(index);
    if let Some(parent) = index.parent() {
        *index = parent;
    }
}

/// Finds the sharpest available tile for `index`, optionally starting
/// `ascend_parents` levels up the tree.
///
/// Clamps to the provider's maximum level first, then ascends on every
/// non-OK status, terminating with an unavailable result at level <= 1.
pub fn highest_resolution_tile(
    provider: &mut dyn TileSource,
    mut index: TileIndex,
    ascend_parents: u8,
) -> ChunkTile {
    let mut uv = TileUvTransform::IDENTITY;

    // Step 1: ascend as many parents as the caller asked for.
    for _ in 0..ascend_parents {
        if index.level <= 1 {
            break;
        }
        ascend_to_parent(&mut index, &mut uv);
    }

    // Step 2: ascend further until we are inside the provider's range of
    // defined data.
    let max_level = provider.max_level();
    while index.level > max_level && index.level > 1 {
        ascend_to_parent(&mut index, &mut uv);
    }

    // Step 3: ascend until a loaded tile is ready to use.
    while index.level > 1 {
        let tile = provider.tile(&index);
        if tile.status == TileStatus::Ok {
            return ChunkTile {
                tile,
                uv_transform: uv,
            };
        }
        ascend_to_parent(&mut index, &mut uv);
    }

    trace!(%index, "no ancestor tile available");
    ChunkTile {
        tile: crate::tile::Tile::UNAVAILABLE,
        uv_transform: uv,
    }
}

/// Competitive selection across a layer group: evaluates every active
/// layer's provider and returns the sharpest OK tile that carries
/// statistics, i.e. the one that ascended least. Not a blend.
pub fn highest_resolution_tile_in_group(group: &mut LayerGroup, index: TileIndex) -> ChunkTile {
    let mut best = ChunkTile::unavailable();
    best.uv_transform.uv_scale.x = 0.0;

    for layer in group.active_layers_mut() {
        let candidate = highest_resolution_tile(layer.provider_mut(), index, 0);
        let is_ok = candidate.tile.status == TileStatus::Ok;
        let has_statistics = candidate.tile.metadata.is_some();
        let is_sharper = candidate.uv_transform.uv_scale.x > best.uv_transform.uv_scale.x;
        if is_ok && has_statistics && is_sharper {
            best = candidate;
        }
    }
    best
}

/// Evaluates every active layer and returns all results sorted descending by
/// resolution (largest UV scale first), for layer compositing.
pub fn tiles_sorted_by_highest_resolution(
    group: &mut LayerGroup,
    index: TileIndex,
) -> Vec<ChunkTile> {
    let mut tiles: Vec<ChunkTile> = group
        .active_layers_mut()
        .map(|layer| highest_resolution_tile(layer.provider_mut(), index, 0))
        .collect();

    tiles.sort_by(|a, b| {
        b.uv_transform
            .uv_scale
            .x
            .partial_cmp(&a.uv_transform.uv_scale.x)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    tiles
}

/// Produces a chain of `pile_size` increasingly coarse entries for
/// multi-tap sampling. An entry that resolves to unavailable reuses the
/// previous (coarser-ancestored) entry, or the provider's explicit default
/// tile for the first one.
pub fn highest_resolution_tile_pile(
    provider: &mut dyn TileSource,
    index: TileIndex,
    pile_size: usize,
) -> ChunkTilePile {
    let mut pile = ChunkTilePile {
        chunk_tiles: Vec::with_capacity(pile_size),
    };
    for i in 0..pile_size {
        let mut entry = highest_resolution_tile(provider, index, i as u8);
        if entry.tile.status == TileStatus::Unavailable {
            entry = match pile.chunk_tiles.last() {
                Some(previous) => previous.clone(),
                None => ChunkTile {
                    tile: provider.default_tile(),
                    uv_transform: TileUvTransform::IDENTITY,
                },
            };
        }
        pile.chunk_tiles.push(entry);
    }
    pile
}
