//! GlobeTile: globe tile streaming and level-of-detail engine.
//!
//! The engine maintains a quadtree of geographic chunks over an ellipsoidal
//! surface, decides each frame which chunks split or merge from
//! view-dependent error estimates, and asynchronously fetches, decodes and
//! caches raster tile data (color, height, overlays) from large geospatial
//! datasets, without ever blocking the render path.
//!
//! # Per-frame flow
//!
//! ```ignore
//! use globetile::{camera::RenderView, config::GlobeConfig, globe::ChunkedGlobe};
//!
//! let config = GlobeConfig::from_file(Path::new("globe.json"))?;
//! let mut globe = ChunkedGlobe::new(&config)?;
//!
//! loop {
//!     let view = RenderView::new(camera_position, globe_transform);
//!     globe.update(&view, simulation_time);       // drain + split/merge
//!     for chunk in globe.render_chunks() {        // never blocks on I/O
//!         // upload chunk.layer_tiles and draw
//!     }
//! }
//! ```
//!
//! Tiles requested this frame become visible on a later frame once their
//! background load completes; until then the selector falls back to the
//! best cached ancestor.

pub mod cache;
pub mod camera;
pub mod chunk;
pub mod config;
pub mod dataset;
pub mod geodetic;
pub mod globe;
pub mod jobs;
pub mod layer;
pub mod loader;
pub mod logging;
pub mod provider;
pub mod selector;
pub mod tile;

/// Version of the GlobeTile library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
