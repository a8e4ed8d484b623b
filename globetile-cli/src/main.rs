//! GlobeTile CLI: drives the engine headlessly.
//!
//! Loads a layer configuration, builds the chunked globe and runs a frame
//! loop with a synthetic descending orbit camera, reporting quadtree and
//! cache statistics. Useful for exercising datasets and tuning LOD
//! parameters without a renderer attached.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use glam::DMat4;
use tracing::{error, info};

use globetile::camera::RenderView;
use globetile::chunk::ChunkLevelEvaluator;
use globetile::config::GlobeConfig;
use globetile::geodetic::{Ellipsoid, Geodetic};
use globetile::globe::ChunkedGlobe;
use globetile::tile::TileStatus;

#[derive(Parser)]
#[command(
    name = "globetile",
    version = globetile::VERSION,
    about = "Streaming level-of-detail globe tile engine, driven headlessly"
)]
struct Cli {
    /// Globe configuration JSON; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(short, long, default_value_t = 120)]
    frames: u32,

    /// Starting camera altitude in meters.
    #[arg(long, default_value_t = 2_000_000.0)]
    altitude: f64,

    /// Altitude lost per frame in meters (descending approach).
    #[arg(long, default_value_t = 10_000.0)]
    descent: f64,

    /// Camera latitude in degrees.
    #[arg(long, default_value_t = 0.0)]
    lat: f64,

    /// Starting camera longitude in degrees.
    #[arg(long, default_value_t = 0.0)]
    lon: f64,

    /// Degrees of longitude traversed per frame.
    #[arg(long, default_value_t = 0.05)]
    orbit_step: f64,

    /// Pause between frames in milliseconds.
    #[arg(long, default_value_t = 16)]
    frame_delay_ms: u64,

    /// Use the projected-area level evaluator instead of distance.
    #[arg(long)]
    projected_area: bool,

    /// Log filter applied when RUST_LOG is unset.
    #[arg(long, default_value = "globetile=info")]
    log: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    globetile::logging::init(&cli.log);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "globetile failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => GlobeConfig::from_file(path)?,
        None => GlobeConfig::default(),
    };

    let mut globe = ChunkedGlobe::new(&config)?;
    if cli.projected_area {
        globe.set_primary_evaluator(ChunkLevelEvaluator::ProjectedArea);
    }
    info!(
        layers = globe.layer_manager().layer_count(),
        frames = cli.frames,
        "globe ready"
    );

    let ellipsoid = Ellipsoid::WGS84;
    let mut altitude = cli.altitude;
    let mut lon = cli.lon;

    for frame in 0..cli.frames {
        let geodetic = Geodetic::from_degrees(cli.lat, lon);
        let surface = ellipsoid.cartesian_surface_position(geodetic);
        let position = surface * (1.0 + altitude / surface.length());
        let view = RenderView::new(position, DMat4::IDENTITY);

        globe.update(&view, Utc::now());
        let chunks = globe.render_chunks();

        let renderable = chunks
            .iter()
            .flat_map(|c| c.layer_tiles.iter())
            .flat_map(|(_, tiles)| tiles.iter())
            .filter(|t| t.tile.status == TileStatus::Ok)
            .count();

        if frame % 30 == 0 || frame + 1 == cli.frames {
            let stats = globe.stats();
            info!(
                frame,
                altitude = altitude as i64,
                leaves = stats.leaf_count,
                visible = stats.visible_leaves,
                depth = stats.max_depth,
                renderable,
                "frame"
            );
        }

        altitude = (altitude - cli.descent).max(1_000.0);
        lon += cli.orbit_step;
        std::thread::sleep(Duration::from_millis(cli.frame_delay_ms));
    }

    let stats = globe.stats();
    info!(
        frames = stats.frame,
        leaves = stats.leaf_count,
        depth = stats.max_depth,
        "run complete"
    );
    Ok(())
}
