//! Geographic primitives: positions and rectangles.

use serde::{Deserialize, Serialize};

/// A geographic position in degrees.
///
/// Serialized as a GeoJSON-style `[lon, lat]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LonLat {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl LonLat {
    /// Creates a new position.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Returns true if both components are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for LonLat {
    fn from(v: [f64; 2]) -> Self {
        Self { lon: v[0], lat: v[1] }
    }
}

impl From<LonLat> for [f64; 2] {
    fn from(p: LonLat) -> Self {
        [p.lon, p.lat]
    }
}

/// An axis-aligned geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Western edge (degrees).
    pub min_lon: f64,
    /// Southern edge (degrees).
    pub min_lat: f64,
    /// Eastern edge (degrees).
    pub max_lon: f64,
    /// Northern edge (degrees).
    pub max_lat: f64,
}

impl Rect {
    /// Creates a rectangle from its edges.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// The degenerate rectangle containing a single point.
    pub fn from_point(p: LonLat) -> Self {
        Self::new(p.lon, p.lat, p.lon, p.lat)
    }

    /// Returns true if the point lies within the rectangle (edges inclusive).
    pub fn contains(&self, p: LonLat) -> bool {
        p.lon >= self.min_lon
            && p.lon <= self.max_lon
            && p.lat >= self.min_lat
            && p.lat <= self.max_lat
    }

    /// Returns true if the two rectangles overlap (edges inclusive).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// Returns this rectangle grown by the given degree margins on each side.
    pub fn expanded(&self, d_lon: f64, d_lat: f64) -> Self {
        Self {
            min_lon: self.min_lon - d_lon,
            min_lat: self.min_lat - d_lat,
            max_lon: self.max_lon + d_lon,
            max_lat: self.max_lat + d_lat,
        }
    }

    /// Grows this rectangle in place to include another.
    pub fn extend(&mut self, other: &Rect) {
        self.min_lon = self.min_lon.min(other.min_lon);
        self.min_lat = self.min_lat.min(other.min_lat);
        self.max_lon = self.max_lon.max(other.max_lon);
        self.max_lat = self.max_lat.max(other.max_lat);
    }

    /// Center point of the rectangle.
    pub fn center(&self) -> LonLat {
        LonLat::new(
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}
