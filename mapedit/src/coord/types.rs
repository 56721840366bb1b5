//! Tile addressing types and validation constants.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum latitude representable in Web Mercator (degrees).
pub const MIN_LAT: f64 = -85.05112878;

/// Maximum latitude representable in Web Mercator (degrees).
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum longitude (degrees).
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude (degrees).
pub const MAX_LON: f64 = 180.0;

/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level supported by the grid.
pub const MAX_ZOOM: u8 = 22;

/// Errors from tile address computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("latitude {0} outside [{MIN_LAT}, {MAX_LAT}]")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("longitude {0} outside [{MIN_LON}, {MAX_LON}]")]
    InvalidLongitude(f64),

    /// Zoom level above [`MAX_ZOOM`].
    #[error("zoom {0} exceeds maximum {MAX_ZOOM}")]
    InvalidZoom(u8),

    /// Quadkey string contained a digit other than 0-3.
    #[error("invalid quadkey {0:?}")]
    InvalidQuadkey(String),
}

/// Address of one tile in the quadtree grid.
///
/// `x` grows eastward, `y` grows southward (Web Mercator convention, matching
/// the slippy-map / quadkey tiling schemes). Both are in `0..2^zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileAddress {
    /// Column (X coordinate in the grid).
    pub x: u32,
    /// Row (Y coordinate in the grid).
    pub y: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl TileAddress {
    /// Creates a new tile address.
    ///
    /// Coordinates outside the grid at `zoom` are rejected.
    pub fn new(x: u32, y: u32, zoom: u8) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let max = 1u32 << zoom;
        if x >= max {
            return Err(CoordError::InvalidLongitude(x as f64));
        }
        if y >= max {
            return Err(CoordError::InvalidLatitude(y as f64));
        }
        Ok(Self { x, y, zoom })
    }

    /// Encodes this address as a quadkey string.
    ///
    /// The quadkey has one digit per zoom level; the root tile at zoom 0 is
    /// the empty string. Each digit interleaves one bit of `x` and `y`.
    pub fn quadkey(&self) -> String {
        let mut key = String::with_capacity(self.zoom as usize);
        for level in (1..=self.zoom).rev() {
            let mask = 1u32 << (level - 1);
            let mut digit = 0u8;
            if self.x & mask != 0 {
                digit += 1;
            }
            if self.y & mask != 0 {
                digit += 2;
            }
            key.push((b'0' + digit) as char);
        }
        key
    }

    /// Decodes a quadkey string back into a tile address.
    pub fn from_quadkey(key: &str) -> Result<Self, CoordError> {
        if key.len() > MAX_ZOOM as usize {
            return Err(CoordError::InvalidZoom(key.len() as u8));
        }
        let zoom = key.len() as u8;
        let mut x = 0u32;
        let mut y = 0u32;
        for ch in key.chars() {
            x <<= 1;
            y <<= 1;
            match ch {
                '0' => {}
                '1' => x |= 1,
                '2' => y |= 1,
                '3' => {
                    x |= 1;
                    y |= 1;
                }
                _ => return Err(CoordError::InvalidQuadkey(key.to_string())),
            }
        }
        Ok(Self { x, y, zoom })
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}
