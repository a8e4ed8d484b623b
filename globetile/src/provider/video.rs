//! Video/streaming tile provider.
//!
//! Serves the single currently decoded frame of an image sequence for every
//! spatial index; one frame covers the whole globe, so `max_level` is
//! effectively unbounded. Frames are decoded off-thread on a cadence derived
//! from the source frame rate.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::{FrameContext, ProviderError, TileSource, VideoDescriptor};
use crate::jobs::{Job, JobManager};
use crate::tile::{Tile, TileDataLayout, TileDataType, TileIndex, TileRaster, TileStatus};

struct DecodedFrame {
    frame_number: usize,
    tile: Tile,
}

struct FrameDecodeJob {
    path: PathBuf,
    frame_number: usize,
    result: Option<DecodedFrame>,
}

impl Job for FrameDecodeJob {
    type Product = DecodedFrame;

    fn execute(&mut self) {
        let tile = match image::open(&self.path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let (width, height) = rgba.dimensions();
                Tile {
                    status: TileStatus::Ok,
                    raster: Some(TileRaster {
                        pixels: Bytes::from(rgba.into_raw()),
                        dimensions: (width, height),
                        layout: TileDataLayout::new(TileDataType::UInt8, 4),
                    }),
                    metadata: None,
                }
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "video frame decode failed");
                Tile::with_status(TileStatus::IoError)
            }
        };
        self.result = Some(DecodedFrame {
            frame_number: self.frame_number,
            tile,
        });
    }

    fn product(self: Box<Self>) -> DecodedFrame {
        let frame_number = self.frame_number;
        self.result.unwrap_or(DecodedFrame {
            frame_number,
            tile: Tile::with_status(TileStatus::IoError),
        })
    }

    fn failure_product(&self) -> DecodedFrame {
        DecodedFrame {
            frame_number: self.frame_number,
            tile: Tile::with_status(TileStatus::IoError),
        }
    }
}

/// Decodes an image sequence on a frame-rate cadence and serves the current
/// frame regardless of spatial index.
pub struct VideoTileProvider {
    frames: Vec<PathBuf>,
    frame_rate: f64,
    decoder: JobManager<DecodedFrame>,
    current: Tile,
    current_frame: Option<usize>,
    requested_frame: Option<usize>,
    start_time: Option<DateTime<Utc>>,
    default_tile: Tile,
}

impl VideoTileProvider {
    pub fn new(descriptor: VideoDescriptor, base_dir: &Path) -> Result<Self, ProviderError> {
        if descriptor.frames.is_empty() {
            return Err(ProviderError::NoVideoFrames);
        }
        if !(descriptor.frame_rate > 0.0) {
            return Err(ProviderError::BadFrameRate(descriptor.frame_rate));
        }

        let frames: Vec<PathBuf> = descriptor
            .frames
            .iter()
            .map(|f| {
                if f.is_absolute() {
                    f.clone()
                } else {
                    base_dir.join(f)
                }
            })
            .collect();

        // An unreachable sequence is a configuration error, not a per-tile
        // one: fail the layer now instead of erroring every frame.
        for frame in &frames {
            if std::fs::metadata(frame).is_err() {
                return Err(ProviderError::MissingVideoFrame(frame.clone()));
            }
        }

        let decoder = JobManager::new(1)?;
        let mut provider = Self {
            frames,
            frame_rate: descriptor.frame_rate,
            decoder,
            current: Tile::UNAVAILABLE,
            current_frame: None,
            requested_frame: None,
            start_time: None,
            default_tile: Tile::solid(0, TileDataLayout::new(TileDataType::UInt8, 4)),
        };
        provider.request_frame(0);
        Ok(provider)
    }

    fn request_frame(&mut self, frame_number: usize) {
        self.decoder.enqueue_job(Box::new(FrameDecodeJob {
            path: self.frames[frame_number % self.frames.len()].clone(),
            frame_number,
            result: None,
        }));
        self.requested_frame = Some(frame_number);
    }

    /// Drains decoded frames and requests the frame the clock has advanced
    /// to, looping over the sequence.
    pub fn update(&mut self, ctx: &FrameContext) {
        while let Some(decoded) = self.decoder.pop_finished_job() {
            if decoded.tile.is_ok() {
                self.current = decoded.tile;
                self.current_frame = Some(decoded.frame_number);
            }
            if self.requested_frame == Some(decoded.frame_number) {
                self.requested_frame = None;
            }
        }

        let start = *self.start_time.get_or_insert(ctx.time);
        let elapsed = (ctx.time - start).num_milliseconds().max(0) as f64 / 1000.0;
        let desired = (elapsed * self.frame_rate) as usize % self.frames.len();

        if self.current_frame != Some(desired) && self.requested_frame.is_none() {
            self.request_frame(desired);
        }
    }

    /// The current frame, whatever the index; the UV transform of the caller
    /// maps the chunk onto it.
    pub fn tile(&mut self, _index: &TileIndex) -> Tile {
        self.current.clone()
    }

    pub fn tile_status(&self, _index: &TileIndex) -> TileStatus {
        self.current.status
    }

    pub fn current_tile(&self) -> Option<&Tile> {
        self.current.is_ok().then_some(&self.current)
    }

    pub fn reset(&mut self) {
        self.current = Tile::UNAVAILABLE;
        self.current_frame = None;
        self.requested_frame = None;
        self.start_time = None;
        self.request_frame(0);
    }

    /// One frame serves all chunks, so there is no upper subdivision bound.
    pub fn max_level(&self) -> u8 {
        u8::MAX
    }

    pub fn min_level(&self) -> u8 {
        1
    }

    pub fn default_tile(&self) -> Tile {
        self.default_tile.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl TileSource for VideoTileProvider {
    fn tile(&mut self, index: &TileIndex) -> Tile {
        VideoTileProvider::tile(self, index)
    }

    fn tile_status(&self, index: &TileIndex) -> TileStatus {
        VideoTileProvider::tile_status(self, index)
    }

    fn max_level(&self) -> u8 {
        VideoTileProvider::max_level(self)
    }

    fn default_tile(&self) -> Tile {
        VideoTileProvider::default_tile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::{Duration, Instant};

    fn write_png(path: &Path, shade: u8) {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([shade, shade, shade, 255]));
        img.save(path).unwrap();
    }

    fn ctx_at(seconds: i64) -> FrameContext {
        FrameContext {
            time: Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
            frame: seconds as u64,
        }
    }

    fn descriptor(dir: &Path, count: usize, frame_rate: f64) -> VideoDescriptor {
        let mut frames = Vec::new();
        for i in 0..count {
            let path = dir.join(format!("frame{i}.png"));
            write_png(&path, (i * 50) as u8);
            frames.push(PathBuf::from(format!("frame{i}.png")));
        }
        VideoDescriptor { frame_rate, frames }
    }

    fn wait_for_frame(provider: &mut VideoTileProvider, ctx: &FrameContext, shade: u8) -> Tile {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            provider.update(ctx);
            let tile = provider.tile(&TileIndex::new(0, 0, 1));
            if let Some(raster) = &tile.raster {
                if raster.pixels[0] == shade {
                    return tile;
                }
            }
            assert!(Instant::now() < deadline, "frame never decoded");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_empty_frame_list_fails() {
        let result = VideoTileProvider::new(
            VideoDescriptor {
                frame_rate: 24.0,
                frames: vec![],
            },
            Path::new("."),
        );
        assert!(matches!(result, Err(ProviderError::NoVideoFrames)));
    }

    #[test]
    fn test_missing_frame_fails_at_construction() {
        let result = VideoTileProvider::new(
            VideoDescriptor {
                frame_rate: 24.0,
                frames: vec![PathBuf::from("no-such-frame.png")],
            },
            Path::new("/nonexistent"),
        );
        assert!(matches!(result, Err(ProviderError::MissingVideoFrame(_))));
    }

    #[test]
    fn test_same_frame_for_every_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider =
            VideoTileProvider::new(descriptor(dir.path(), 1, 1.0), dir.path()).unwrap();

        let tile = wait_for_frame(&mut provider, &ctx_at(0), 0);
        assert!(tile.is_ok());

        let deep = provider.tile(&TileIndex::new(1000, 500, 12));
        assert_eq!(deep, tile);
        assert_eq!(provider.max_level(), u8::MAX);
    }

    #[test]
    fn test_clock_advances_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider =
            VideoTileProvider::new(descriptor(dir.path(), 3, 1.0), dir.path()).unwrap();

        wait_for_frame(&mut provider, &ctx_at(0), 0);
        // Two seconds at 1 fps: frame 2, shade 100.
        wait_for_frame(&mut provider, &ctx_at(2), 100);
        // The sequence loops: four seconds in, back to frame 1.
        wait_for_frame(&mut provider, &ctx_at(4), 50);
    }

    #[test]
    fn test_unavailable_before_first_decode() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            VideoTileProvider::new(descriptor(dir.path(), 1, 1.0), dir.path()).unwrap();
        assert_eq!(
            provider.tile_status(&TileIndex::new(0, 0, 1)),
            TileStatus::Unavailable
        );
    }
}
