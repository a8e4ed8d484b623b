//! Temporal tile provider: multiplexes many underlying providers keyed by
//! simulation time, with optional interpolation between the two nearest
//! time keys.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use tracing::error;

use super::caching::CachingTileProvider;
use super::{FrameContext, ProviderError, ProviderInitData, TemporalDescriptor, TileSource};
use crate::cache::TileCache;
use crate::dataset::TileDepthTransform;
use crate::tile::{Tile, TileDataType, TileIndex, TileMetaData, TileRaster, TileStatus};

/// Supported textual time-key formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// `YYYY-MM-DD`
    Date,
    /// `YYYYMMDD_hhmmss`
    CompactSeconds,
    /// `YYYYMMDD_hhmm`
    CompactMinutes,
    /// `YYYY-MM-DDThh:mm:ssZ`
    IsoColons,
    /// `YYYY-MM-DDThh_mm_ssZ`
    IsoUnderscores,
}

impl TimeFormat {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "YYYY-MM-DD" => Some(TimeFormat::Date),
            "YYYYMMDD_hhmmss" => Some(TimeFormat::CompactSeconds),
            "YYYYMMDD_hhmm" => Some(TimeFormat::CompactMinutes),
            "YYYY-MM-DDThh:mm:ssZ" => Some(TimeFormat::IsoColons),
            "YYYY-MM-DDThh_mm_ssZ" => Some(TimeFormat::IsoUnderscores),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TimeFormat::Date => "YYYY-MM-DD",
            TimeFormat::CompactSeconds => "YYYYMMDD_hhmmss",
            TimeFormat::CompactMinutes => "YYYYMMDD_hhmm",
            TimeFormat::IsoColons => "YYYY-MM-DDThh:mm:ssZ",
            TimeFormat::IsoUnderscores => "YYYY-MM-DDThh_mm_ssZ",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            TimeFormat::Date => r"^\d{4}-\d{2}-\d{2}$",
            TimeFormat::CompactSeconds => r"^\d{8}_\d{6}$",
            TimeFormat::CompactMinutes => r"^\d{8}_\d{4}$",
            TimeFormat::IsoColons => r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$",
            TimeFormat::IsoUnderscores => r"^\d{4}-\d{2}-\d{2}T\d{2}_\d{2}_\d{2}Z$",
        }
    }

    fn chrono_format(&self) -> &'static str {
        match self {
            TimeFormat::Date => "%Y-%m-%d",
            TimeFormat::CompactSeconds => "%Y%m%d_%H%M%S",
            TimeFormat::CompactMinutes => "%Y%m%d_%H%M",
            TimeFormat::IsoColons => "%Y-%m-%dT%H:%M:%SZ",
            TimeFormat::IsoUnderscores => "%Y-%m-%dT%H_%M_%SZ",
        }
    }

    /// Parses a key string into a UTC instant. Strict about shape.
    pub fn parse_key(&self, key: &str) -> Option<DateTime<Utc>> {
        let pattern = Regex::new(self.pattern()).ok()?;
        if !pattern.is_match(key) {
            return None;
        }
        match self {
            TimeFormat::Date => NaiveDate::parse_from_str(key, self.chrono_format())
                .ok()?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc()),
            _ => NaiveDateTime::parse_from_str(key, self.chrono_format())
                .ok()
                .map(|dt| dt.and_utc()),
        }
    }

    pub fn format_time(&self, time: &DateTime<Utc>) -> String {
        time.format(self.chrono_format()).to_string()
    }
}

/// Blends the tiles of the two temporally nearest providers on the CPU and
/// caches the blended results.
pub struct InterpolateTileProvider {
    blend_cache: TileCache,
}

impl InterpolateTileProvider {
    pub fn new(cache_size: usize) -> Self {
        Self {
            blend_cache: TileCache::new(cache_size),
        }
    }

    fn cache_key(index: &TileIndex, t1: &str, t2: &str, factor: f32) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        index.hash_key().hash(&mut hasher);
        t1.hash(&mut hasher);
        t2.hash(&mut hasher);
        ((factor * 4096.0) as u32).hash(&mut hasher);
        hasher.finish()
    }

    pub fn cached(&mut self, index: &TileIndex, t1: &str, t2: &str, factor: f32) -> Option<Tile> {
        self.blend_cache.get(Self::cache_key(index, t1, t2, factor))
    }

    pub fn clear(&mut self) {
        self.blend_cache.clear();
    }

    /// Blends `tile1` and `tile2` with the given factor (0 = entirely the
    /// earlier tile). Falls back to whichever input is usable when the two
    /// cannot be combined.
    pub fn blend(
        &mut self,
        index: &TileIndex,
        t1: &str,
        t2: &str,
        factor: f32,
        tile1: Tile,
        tile2: Tile,
    ) -> Tile {
        let compatible = match (&tile1.raster, &tile2.raster) {
            (Some(a), Some(b)) => {
                tile1.is_ok()
                    && tile2.is_ok()
                    && a.dimensions == b.dimensions
                    && a.layout == b.layout
            }
            _ => false,
        };
        if !compatible {
            if tile1.is_ok() {
                return tile1;
            }
            if tile2.is_ok() {
                return tile2;
            }
            return tile1;
        }

        let (a, b) = match (tile1.raster.clone(), tile2.raster.clone()) {
            (Some(a), Some(b)) => (a, b),
            _ => return tile1,
        };

        let pixels = lerp_samples(&a.pixels, &b.pixels, factor, a.layout.data_type);
        let metadata = match (tile1.metadata.as_deref(), tile2.metadata.as_deref()) {
            (Some(m1), Some(m2)) if m1.min_values.len() == m2.min_values.len() => {
                Some(std::sync::Arc::new(TileMetaData {
                    min_values: lerp_f32(&m1.min_values, &m2.min_values, factor),
                    max_values: lerp_f32(&m1.max_values, &m2.max_values, factor),
                }))
            }
            _ => None,
        };

        let blended = Tile {
            status: TileStatus::Ok,
            raster: Some(TileRaster {
                pixels: bytes::Bytes::from(pixels),
                dimensions: a.dimensions,
                layout: a.layout,
            }),
            metadata,
        };
        self.blend_cache
            .put(Self::cache_key(index, t1, t2, factor), blended.clone());
        blended
    }
}

fn lerp_f32(a: &[f32], b: &[f32], factor: f32) -> Vec<f32> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x + (y - x) * factor)
        .collect()
}

fn lerp_samples(a: &[u8], b: &[u8], factor: f32, data_type: TileDataType) -> Vec<u8> {
    let t = factor as f64;
    let mut out = Vec::with_capacity(a.len());

    macro_rules! lerp {
        ($ty:ty) => {{
            const W: usize = std::mem::size_of::<$ty>();
            for (ca, cb) in a.chunks_exact(W).zip(b.chunks_exact(W)) {
                let mut ra = [0u8; W];
                let mut rb = [0u8; W];
                ra.copy_from_slice(ca);
                rb.copy_from_slice(cb);
                let va = <$ty>::from_ne_bytes(ra) as f64;
                let vb = <$ty>::from_ne_bytes(rb) as f64;
                let v = (va + (vb - va) * t) as $ty;
                out.extend_from_slice(&v.to_ne_bytes());
            }
        }};
    }

    match data_type {
        TileDataType::UInt8 => lerp!(u8),
        TileDataType::UInt16 => lerp!(u16),
        TileDataType::Int16 => lerp!(i16),
        TileDataType::UInt32 => lerp!(u32),
        TileDataType::Int32 => lerp!(i32),
        TileDataType::Float32 => lerp!(f32),
        TileDataType::Float64 => lerp!(f64),
    }
    out
}

#[derive(Debug, Clone)]
struct Selection {
    t1: String,
    /// Present only when interpolating strictly between two keys.
    t2: Option<String>,
    factor: f32,
}

/// Builds one concrete sub-provider per time key.
pub type SubProviderBuilder =
    Box<dyn Fn(&Path, &ProviderInitData) -> Result<CachingTileProvider, ProviderError> + Send>;

/// Resolves a time key from the simulation clock and forwards to whichever
/// concrete provider matches, instantiating providers lazily per key.
pub struct TemporalTileProvider {
    time_format: TimeFormat,
    template: String,
    base_dir: PathBuf,
    /// Known keys, sorted by time.
    keys: Vec<(DateTime<Utc>, String)>,
    init: ProviderInitData,
    builder: SubProviderBuilder,
    providers: HashMap<String, CachingTileProvider>,
    failed_keys: HashSet<String>,
    interpolation: bool,
    interpolator: InterpolateTileProvider,
    selection: Option<Selection>,
    max_level: u8,
    depth_transform: TileDepthTransform,
    no_data: Option<f64>,
    default_tile: Tile,
}

impl TemporalTileProvider {
    pub fn new(
        descriptor: TemporalDescriptor,
        base_dir: PathBuf,
        init: ProviderInitData,
    ) -> Result<Self, ProviderError> {
        Self::with_builder(
            descriptor,
            base_dir,
            init,
            Box::new(|path, init| CachingTileProvider::from_path(path, init)),
        )
    }

    /// As [`TemporalTileProvider::new`] but with a custom sub-provider
    /// builder, the seam used for procedural datasets.
    pub fn with_builder(
        descriptor: TemporalDescriptor,
        base_dir: PathBuf,
        init: ProviderInitData,
        builder: SubProviderBuilder,
    ) -> Result<Self, ProviderError> {
        let time_format = TimeFormat::from_tag(&descriptor.time_format)
            .ok_or_else(|| ProviderError::UnknownTimeFormat(descriptor.time_format.clone()))?;

        let mut keys = Vec::with_capacity(descriptor.keys.len());
        for key in &descriptor.keys {
            let time = time_format
                .parse_key(key)
                .ok_or_else(|| ProviderError::BadTimeKey {
                    key: key.clone(),
                    format: time_format.tag().to_string(),
                })?;
            keys.push((time, key.clone()));
        }
        if keys.is_empty() {
            return Err(ProviderError::NoTimeKeys);
        }
        keys.sort_by_key(|(time, _)| *time);

        let mut provider = Self {
            time_format,
            template: descriptor.template,
            base_dir,
            keys,
            interpolation: descriptor.interpolation,
            interpolator: InterpolateTileProvider::new(init.cache_size),
            providers: HashMap::new(),
            failed_keys: HashSet::new(),
            selection: None,
            max_level: 0,
            depth_transform: TileDepthTransform::default(),
            no_data: None,
            default_tile: Tile::UNAVAILABLE,
            builder,
            init,
        };

        // Instantiate the first key eagerly so a broken template fails the
        // layer at construction, and so the level range is known up front.
        let first_key = provider.keys[0].1.clone();
        let locator = provider.locator_for(&first_key);
        let first = (provider.builder)(&locator, &provider.init)?;
        provider.max_level = first.max_level();
        provider.depth_transform = first.depth_transform();
        provider.no_data = first.no_data_value();
        provider.default_tile = first.default_tile();
        provider.providers.insert(first_key, first);

        Ok(provider)
    }

    pub fn time_format(&self) -> TimeFormat {
        self.time_format
    }

    fn locator_for(&self, key: &str) -> PathBuf {
        let expanded = self.template.replace("${TimeKey}", key);
        let path = Path::new(&expanded);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn ensure_provider(&mut self, key: &str) -> bool {
        if self.providers.contains_key(key) {
            return true;
        }
        if self.failed_keys.contains(key) {
            return false;
        }
        let locator = self.locator_for(key);
        match (self.builder)(&locator, &self.init) {
            Ok(provider) => {
                self.providers.insert(key.to_string(), provider);
                true
            }
            Err(err) => {
                error!(key, error = %err, "temporal sub-provider failed; disabling key");
                self.failed_keys.insert(key.to_string());
                false
            }
        }
    }

    /// Maps a simulation time onto the known keys: clamped to the ends, the
    /// floor key otherwise, plus the successor when interpolating strictly
    /// between two keys.
    fn resolve(&self, time: DateTime<Utc>) -> Selection {
        let first = &self.keys[0];
        let last = &self.keys[self.keys.len() - 1];
        if time <= first.0 {
            return Selection {
                t1: first.1.clone(),
                t2: None,
                factor: 0.0,
            };
        }
        if time >= last.0 {
            return Selection {
                t1: last.1.clone(),
                t2: None,
                factor: 0.0,
            };
        }

        let i = self.keys.partition_point(|(key_time, _)| *key_time <= time) - 1;
        let (t1_time, t1_key) = &self.keys[i];
        if !self.interpolation || *t1_time == time {
            return Selection {
                t1: t1_key.clone(),
                t2: None,
                factor: 0.0,
            };
        }

        let (t2_time, t2_key) = &self.keys[i + 1];
        let span = (*t2_time - *t1_time).num_milliseconds() as f64;
        let elapsed = (time - *t1_time).num_milliseconds() as f64;
        Selection {
            t1: t1_key.clone(),
            t2: Some(t2_key.clone()),
            factor: (elapsed / span.max(1.0)) as f32,
        }
    }

    /// Re-resolves the current time key and drains all instantiated
    /// sub-providers.
    pub fn update(&mut self, ctx: &FrameContext) {
        let selection = self.resolve(ctx.time);
        self.ensure_provider(&selection.t1.clone());
        if let Some(t2) = selection.t2.clone() {
            self.ensure_provider(&t2);
        }
        self.selection = Some(selection);

        for provider in self.providers.values_mut() {
            provider.update();
        }
    }

    pub fn tile(&mut self, index: &TileIndex) -> Tile {
        let Some(selection) = self.selection.clone() else {
            return Tile::UNAVAILABLE;
        };

        if let Some(t2_key) = &selection.t2 {
            if let Some(cached) =
                self.interpolator
                    .cached(index, &selection.t1, t2_key, selection.factor)
            {
                return cached;
            }
            let tile1 = match self.providers.get_mut(&selection.t1) {
                Some(p) => p.tile(index),
                None => Tile::UNAVAILABLE,
            };
            let tile2 = match self.providers.get_mut(t2_key) {
                Some(p) => p.tile(index),
                None => Tile::UNAVAILABLE,
            };
            return self.interpolator.blend(
                index,
                &selection.t1,
                t2_key,
                selection.factor,
                tile1,
                tile2,
            );
        }

        match self.providers.get_mut(&selection.t1) {
            Some(provider) => provider.tile(index),
            None => Tile::UNAVAILABLE,
        }
    }

    pub fn tile_status(&self, index: &TileIndex) -> TileStatus {
        self.selection
            .as_ref()
            .and_then(|s| self.providers.get(&s.t1))
            .map(|p| p.tile_status(index))
            .unwrap_or(TileStatus::Unavailable)
    }

    pub fn cached_tile(&self, index: &TileIndex) -> Option<&Tile> {
        self.selection
            .as_ref()
            .and_then(|s| self.providers.get(&s.t1))
            .and_then(|p| p.cached_tile(index))
    }

    pub fn reset(&mut self) {
        for provider in self.providers.values_mut() {
            provider.reset();
        }
        self.interpolator.clear();
        self.selection = None;
    }

    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    pub fn min_level(&self) -> u8 {
        1
    }

    pub fn depth_transform(&self) -> TileDepthTransform {
        self.depth_transform
    }

    pub fn no_data_value_as_float(&self) -> f32 {
        self.no_data.map(|v| v as f32).unwrap_or(f32::NAN)
    }

    pub fn default_tile(&self) -> Tile {
        self.default_tile.clone()
    }

    /// Number of concrete providers instantiated so far.
    pub fn instantiated_providers(&self) -> usize {
        self.providers.len()
    }
}

impl TileSource for TemporalTileProvider {
    fn tile(&mut self, index: &TileIndex) -> Tile {
        TemporalTileProvider::tile(self, index)
    }

    fn tile_status(&self, index: &TileIndex) -> TileStatus {
        TemporalTileProvider::tile_status(self, index)
    }

    fn max_level(&self) -> u8 {
        TemporalTileProvider::max_level(self)
    }

    fn default_tile(&self) -> Tile {
        TemporalTileProvider::default_tile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetConfig, MemoryRasterSource, RasterDataset};
    use crate::tile::TileDataLayout;
    use bytes::Bytes;
    use std::time::{Duration, Instant};

    fn utc(s: &str) -> DateTime<Utc> {
        TimeFormat::Date.parse_key(s).unwrap()
    }

    #[test]
    fn test_time_format_tags_round_trip() {
        for tag in [
            "YYYY-MM-DD",
            "YYYYMMDD_hhmmss",
            "YYYYMMDD_hhmm",
            "YYYY-MM-DDThh:mm:ssZ",
            "YYYY-MM-DDThh_mm_ssZ",
        ] {
            let format = TimeFormat::from_tag(tag).expect("known tag");
            assert_eq!(format.tag(), tag);
        }
        assert!(TimeFormat::from_tag("MM/DD/YYYY").is_none());
    }

    #[test]
    fn test_parse_and_format_keys() {
        let format = TimeFormat::CompactSeconds;
        let time = format.parse_key("20200315_120000").expect("valid key");
        assert_eq!(format.format_time(&time), "20200315_120000");

        assert!(TimeFormat::Date.parse_key("2020-3-15").is_none());
        assert!(TimeFormat::Date.parse_key("20200315").is_none());
        assert!(TimeFormat::IsoColons
            .parse_key("2020-03-15T12:00:00Z")
            .is_some());
    }

    fn descriptor(keys: &[&str], interpolation: bool) -> TemporalDescriptor {
        TemporalDescriptor {
            time_format: "YYYY-MM-DD".to_string(),
            template: "${TimeKey}.mem".to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            interpolation,
        }
    }

    /// Builder producing uniform-valued synthetic datasets: the day of the
    /// month becomes the pixel value, so sub-providers are distinguishable.
    fn test_builder() -> SubProviderBuilder {
        Box::new(|path, init| {
            let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let day: u8 = name
                .rsplit('-')
                .next()
                .and_then(|d| d.parse().ok())
                .unwrap_or(0);
            let dataset = RasterDataset::new(
                Box::new(MemoryRasterSource::uniform(512, 256, 1, 1, day * 10)),
                DatasetConfig {
                    minimum_pixel_size: init.minimum_pixel_size,
                    preprocess_tiles: init.preprocess_tiles,
                },
            )?;
            CachingTileProvider::from_dataset(dataset, init)
        })
    }

    fn init() -> ProviderInitData {
        ProviderInitData {
            minimum_pixel_size: 32,
            ..Default::default()
        }
    }

    #[test]
    fn test_bad_key_fails_at_construction() {
        let result = TemporalTileProvider::with_builder(
            descriptor(&["2020-01-01", "not-a-date"], false),
            PathBuf::from("."),
            init(),
            test_builder(),
        );
        assert!(matches!(result, Err(ProviderError::BadTimeKey { .. })));
    }

    #[test]
    fn test_empty_keys_fail_at_construction() {
        let result = TemporalTileProvider::with_builder(
            descriptor(&[], false),
            PathBuf::from("."),
            init(),
            test_builder(),
        );
        assert!(matches!(result, Err(ProviderError::NoTimeKeys)));
    }

    #[test]
    fn test_resolution_clamps_and_floors() {
        let provider = TemporalTileProvider::with_builder(
            descriptor(&["2020-01-10", "2020-01-20"], false),
            PathBuf::from("."),
            init(),
            test_builder(),
        )
        .unwrap();

        assert_eq!(provider.resolve(utc("2020-01-01")).t1, "2020-01-10");
        assert_eq!(provider.resolve(utc("2020-01-25")).t1, "2020-01-20");
        let mid = provider.resolve(utc("2020-01-12"));
        assert_eq!(mid.t1, "2020-01-10");
        assert!(mid.t2.is_none());
    }

    #[test]
    fn test_interpolating_resolution_brackets_time() {
        let provider = TemporalTileProvider::with_builder(
            descriptor(&["2020-01-10", "2020-01-20"], true),
            PathBuf::from("."),
            init(),
            test_builder(),
        )
        .unwrap();

        let mid = provider.resolve(utc("2020-01-15"));
        assert_eq!(mid.t1, "2020-01-10");
        assert_eq!(mid.t2.as_deref(), Some("2020-01-20"));
        assert!((mid.factor - 0.5).abs() < 1e-6);

        // Exactly on a key: no interpolation partner.
        let exact = provider.resolve(utc("2020-01-20"));
        assert!(exact.t2.is_none());
    }

    fn drive_until_ok(provider: &mut TemporalTileProvider, ctx: &FrameContext, index: &TileIndex) -> Tile {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            provider.update(ctx);
            let tile = provider.tile(index);
            if tile.is_ok() {
                return tile;
            }
            assert!(Instant::now() < deadline, "tile never became available");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_tile_between_keys_blends_both_providers() {
        let mut provider = TemporalTileProvider::with_builder(
            descriptor(&["2020-01-10", "2020-01-20"], true),
            PathBuf::from("."),
            init(),
            test_builder(),
        )
        .unwrap();

        let ctx = FrameContext {
            time: utc("2020-01-15"),
            frame: 0,
        };
        let index = TileIndex::new(0, 0, 1);
        let tile = drive_until_ok(&mut provider, &ctx, &index);

        // Both sub-providers must exist and contribute: values 100 and 200
        // blended halfway give 150.
        assert_eq!(provider.instantiated_providers(), 2);
        let raster = tile.raster.expect("blended tile has data");
        assert!(raster.pixels.iter().all(|&v| v == 150));
    }

    #[test]
    fn test_non_interpolating_forwards_to_floor_key() {
        let mut provider = TemporalTileProvider::with_builder(
            descriptor(&["2020-01-10", "2020-01-20"], false),
            PathBuf::from("."),
            init(),
            test_builder(),
        )
        .unwrap();

        let ctx = FrameContext {
            time: utc("2020-01-15"),
            frame: 0,
        };
        let index = TileIndex::new(0, 0, 1);
        let tile = drive_until_ok(&mut provider, &ctx, &index);
        let raster = tile.raster.expect("data");
        assert!(raster.pixels.iter().all(|&v| v == 100));
        assert_eq!(provider.instantiated_providers(), 1);
    }

    #[test]
    fn test_blend_lerps_u8_samples() {
        let mut interpolator = InterpolateTileProvider::new(8);
        let layout = TileDataLayout::new(TileDataType::UInt8, 1);
        let make = |value: u8| Tile {
            status: TileStatus::Ok,
            raster: Some(TileRaster {
                pixels: Bytes::from(vec![value; 16]),
                dimensions: (4, 4),
                layout,
            }),
            metadata: None,
        };

        let index = TileIndex::new(0, 0, 1);
        let blended = interpolator.blend(&index, "a", "b", 0.25, make(0), make(200));
        let raster = blended.raster.unwrap();
        assert!(raster.pixels.iter().all(|&v| v == 50));

        // The blended tile is cached for the same (keys, factor) triple.
        assert!(interpolator.cached(&index, "a", "b", 0.25).is_some());
        assert!(interpolator.cached(&index, "a", "b", 0.75).is_none());
    }

    #[test]
    fn test_blend_falls_back_to_available_side() {
        let mut interpolator = InterpolateTileProvider::new(8);
        let layout = TileDataLayout::new(TileDataType::UInt8, 1);
        let ok = Tile {
            status: TileStatus::Ok,
            raster: Some(TileRaster {
                pixels: Bytes::from(vec![9u8; 16]),
                dimensions: (4, 4),
                layout,
            }),
            metadata: None,
        };
        let index = TileIndex::new(0, 0, 1);
        let result =
            interpolator.blend(&index, "a", "b", 0.5, Tile::UNAVAILABLE, ok.clone());
        assert_eq!(result, ok);
    }
}
