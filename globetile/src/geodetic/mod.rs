//! Geodetic coordinates, patches and a minimal reference ellipsoid.
//!
//! Angles are radians throughout; the dataset layer converts to degrees at
//! the GDAL boundary. A [`GeodeticPatch`] is the latitude/longitude rectangle
//! covered by one quadtree index, with two root tiles side by side at level 0
//! (west and east hemispheres), so patches are square in angle space.

use glam::DVec3;
use std::f64::consts::PI;

use crate::tile::TileIndex;

/// A latitude/longitude pair in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geodetic {
    /// Latitude in radians, positive north.
    pub lat: f64,
    /// Longitude in radians, positive east.
    pub lon: f64,
}

impl Geodetic {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Construct from degrees.
    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> Self {
        Self {
            lat: lat_deg.to_radians(),
            lon: lon_deg.to_radians(),
        }
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat.to_degrees()
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon.to_degrees()
    }
}

/// A geodetic position with a height above the ellipsoid surface, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geodetic3 {
    pub geodetic: Geodetic,
    pub height: f64,
}

/// Quadrant of a patch or quadtree child, north row first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quad {
    NorthWest = 0,
    NorthEast = 1,
    SouthWest = 2,
    SouthEast = 3,
}

impl Quad {
    pub const ALL: [Quad; 4] = [
        Quad::NorthWest,
        Quad::NorthEast,
        Quad::SouthWest,
        Quad::SouthEast,
    ];
}

/// The angular rectangle a tile index maps to, stored as center + half size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPatch {
    center: Geodetic,
    half_size: Geodetic,
}

impl GeodeticPatch {
    pub fn new(center: Geodetic, half_size: Geodetic) -> Self {
        Self { center, half_size }
    }

    /// The patch covered by `index` on the two-root global grid.
    ///
    /// At level `L` there are `2^(L+1)` columns and `2^L` rows; every patch
    /// spans `pi / 2^L` radians along both axes. Row 0 touches the north pole.
    pub fn from_index(index: &TileIndex) -> Self {
        let span = PI / (1u64 << index.level) as f64;
        let center = Geodetic {
            lat: PI / 2.0 - (index.y as f64 + 0.5) * span,
            lon: -PI + (index.x as f64 + 0.5) * span,
        };
        let half_size = Geodetic {
            lat: span / 2.0,
            lon: span / 2.0,
        };
        Self { center, half_size }
    }

    pub fn center(&self) -> Geodetic {
        self.center
    }

    pub fn half_size(&self) -> Geodetic {
        self.half_size
    }

    pub fn min_lat(&self) -> f64 {
        self.center.lat - self.half_size.lat
    }

    pub fn max_lat(&self) -> f64 {
        self.center.lat + self.half_size.lat
    }

    pub fn min_lon(&self) -> f64 {
        self.center.lon - self.half_size.lon
    }

    pub fn max_lon(&self) -> f64 {
        self.center.lon + self.half_size.lon
    }

    pub fn corner(&self, quad: Quad) -> Geodetic {
        match quad {
            Quad::NorthWest => Geodetic::new(self.max_lat(), self.min_lon()),
            Quad::NorthEast => Geodetic::new(self.max_lat(), self.max_lon()),
            Quad::SouthWest => Geodetic::new(self.min_lat(), self.min_lon()),
            Quad::SouthEast => Geodetic::new(self.min_lat(), self.max_lon()),
        }
    }

    /// Clamps `point` into the patch, wrapping longitude so that the clamp
    /// happens along the shorter way around the globe.
    pub fn closest_point(&self, point: Geodetic) -> Geodetic {
        let lat = point.lat.clamp(self.min_lat(), self.max_lat());

        let mut delta_lon = point.lon - self.center.lon;
        while delta_lon > PI {
            delta_lon -= 2.0 * PI;
        }
        while delta_lon < -PI {
            delta_lon += 2.0 * PI;
        }
        let lon = self.center.lon + delta_lon.clamp(-self.half_size.lon, self.half_size.lon);

        Geodetic::new(lat, lon)
    }

    /// The patch corner closest to `point` in angle space.
    pub fn closest_corner(&self, point: Geodetic) -> Geodetic {
        let north = point.lat > self.center.lat;

        let mut delta_lon = point.lon - self.center.lon;
        while delta_lon > PI {
            delta_lon -= 2.0 * PI;
        }
        while delta_lon < -PI {
            delta_lon += 2.0 * PI;
        }
        let east = delta_lon > 0.0;

        match (north, east) {
            (true, false) => self.corner(Quad::NorthWest),
            (true, true) => self.corner(Quad::NorthEast),
            (false, false) => self.corner(Quad::SouthWest),
            (false, true) => self.corner(Quad::SouthEast),
        }
    }

    /// True if the patch rectangle overlaps the given lat/lon rectangle,
    /// all in radians.
    pub fn intersects_rect(&self, min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> bool {
        self.min_lat() < max_lat
            && self.max_lat() > min_lat
            && self.min_lon() < max_lon
            && self.max_lon() > min_lon
    }
}

/// Reference ellipsoid used for distance and visibility estimates.
///
/// Only the handful of conversions the level evaluators need live here; the
/// full geodesy toolbox is out of scope for the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    radii: DVec3,
}

impl Ellipsoid {
    /// WGS84 semi-axes in meters.
    pub const WGS84: Ellipsoid = Ellipsoid {
        radii: DVec3::new(6_378_137.0, 6_378_137.0, 6_356_752.314_245),
    };

    pub fn new(radii: DVec3) -> Self {
        Self { radii }
    }

    pub fn radii(&self) -> DVec3 {
        self.radii
    }

    pub fn minimum_radius(&self) -> f64 {
        self.radii.x.min(self.radii.y).min(self.radii.z)
    }

    pub fn maximum_radius(&self) -> f64 {
        self.radii.x.max(self.radii.y).max(self.radii.z)
    }

    /// Outward unit normal of the ellipsoid surface at `geodetic`.
    pub fn geodetic_surface_normal(&self, geodetic: Geodetic) -> DVec3 {
        let cos_lat = geodetic.lat.cos();
        DVec3::new(
            cos_lat * geodetic.lon.cos(),
            cos_lat * geodetic.lon.sin(),
            geodetic.lat.sin(),
        )
    }

    /// Cartesian position on the ellipsoid surface.
    pub fn cartesian_surface_position(&self, geodetic: Geodetic) -> DVec3 {
        self.cartesian_position(Geodetic3 {
            geodetic,
            height: 0.0,
        })
    }

    /// Cartesian position at a height above the ellipsoid surface.
    pub fn cartesian_position(&self, pos: Geodetic3) -> DVec3 {
        let normal = self.geodetic_surface_normal(pos.geodetic);
        let radii_sq = self.radii * self.radii;
        let k = radii_sq * normal;
        let gamma = (normal.dot(k)).sqrt();
        let surface = k / gamma;
        surface + normal * pos.height
    }

    /// Geodetic latitude/longitude below a cartesian position.
    ///
    /// Uses Bowring's single-iteration approximation, which is far below the
    /// error tolerance of the level evaluators that consume it.
    pub fn cartesian_to_geodetic(&self, position: DVec3) -> Geodetic {
        let a = self.radii.x;
        let b = self.radii.z;
        let p = (position.x * position.x + position.y * position.y).sqrt();
        if p < 1e-9 {
            // On the polar axis
            return Geodetic::new(if position.z >= 0.0 { PI / 2.0 } else { -PI / 2.0 }, 0.0);
        }
        let e2 = (a * a - b * b) / (a * a);
        let ep2 = (a * a - b * b) / (b * b);
        let theta = (position.z * a).atan2(p * b);
        let lat = (position.z + ep2 * b * theta.sin().powi(3))
            .atan2(p - e2 * a * theta.cos().powi(3));
        let lon = position.y.atan2(position.x);
        Geodetic::new(lat, lon)
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}
