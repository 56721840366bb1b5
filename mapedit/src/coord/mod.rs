//! Tile grid addressing.
//!
//! Pure conversions between geographic coordinates (longitude/latitude) and
//! Web Mercator quadtree tile addresses, plus tile bounding boxes and
//! parent/child/neighbor derivation. All functions are stateless and
//! deterministic: a coordinate exactly on a tile boundary always resolves to
//! the tile whose index is the floor of the scaled coordinate ("lower tile
//! wins"), so repeated calls never drift across the boundary.

mod types;

pub use types::{
    CoordError, TileAddress, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use crate::geom::{LonLat, Rect};
use std::f64::consts::PI;

/// Converts a geographic coordinate to its tile address at `zoom`.
///
/// # Arguments
///
/// * `zoom` - Zoom level (0 to [`MAX_ZOOM`])
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `lat` - Latitude in degrees ([`MIN_LAT`] to [`MAX_LAT`])
///
/// # Errors
///
/// Returns a [`CoordError`] when any input is outside its valid range.
#[inline]
pub fn tile_address(zoom: u8, lon: f64, lat: f64) -> Result<TileAddress, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = (1u32 << zoom) as f64;

    // Floor resolves boundary coordinates to the lower tile. lon == 180.0
    // would land one past the last column, which wraps to column 0.
    let mut x = (((lon + 180.0) / 360.0) * n).floor() as u32;
    if x >= n as u32 {
        x = 0;
    }

    let lat_rad = lat * PI / 180.0;
    let mut y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor() as u32;
    if y >= n as u32 {
        y = n as u32 - 1;
    }

    Ok(TileAddress { x, y, zoom })
}

/// Returns the geographic bounding box of a tile.
///
/// Exact inverse of [`tile_address`] to addressing precision: the box spans
/// from the tile's northwest corner to the northwest corner of the next
/// tile in each axis.
pub fn bounds(addr: &TileAddress) -> Rect {
    let n = (1u32 << addr.zoom) as f64;

    let lon_min = addr.x as f64 / n * 360.0 - 180.0;
    let lon_max = (addr.x + 1) as f64 / n * 360.0 - 180.0;

    // Web Mercator rows grow southward: row y starts at the higher latitude.
    let lat_max = inv_mercator(addr.y as f64 / n);
    let lat_min = inv_mercator((addr.y + 1) as f64 / n);

    Rect::new(lon_min, lat_min, lon_max, lat_max)
}

/// Inverse Web Mercator: normalized row position to latitude in degrees.
#[inline]
fn inv_mercator(y: f64) -> f64 {
    (PI * (1.0 - 2.0 * y)).sinh().atan() * 180.0 / PI
}

/// Returns the parent tile one zoom level up, or `None` at zoom 0.
pub fn parent(addr: &TileAddress) -> Option<TileAddress> {
    if addr.zoom == 0 {
        return None;
    }
    Some(TileAddress {
        x: addr.x / 2,
        y: addr.y / 2,
        zoom: addr.zoom - 1,
    })
}

/// Returns the four child tiles one zoom level down.
///
/// # Errors
///
/// Returns [`CoordError::InvalidZoom`] when `addr` is already at [`MAX_ZOOM`].
pub fn children(addr: &TileAddress) -> Result<[TileAddress; 4], CoordError> {
    if addr.zoom >= MAX_ZOOM {
        return Err(CoordError::InvalidZoom(addr.zoom + 1));
    }
    let zoom = addr.zoom + 1;
    let x = addr.x * 2;
    let y = addr.y * 2;
    Ok([
        TileAddress { x, y, zoom },
        TileAddress { x: x + 1, y, zoom },
        TileAddress { x, y: y + 1, zoom },
        TileAddress { x: x + 1, y: y + 1, zoom },
    ])
}

/// Returns the neighboring tiles at the same zoom level.
///
/// Up to 8 neighbors; columns wrap across the antimeridian, rows are clamped
/// at the poles (a tile in the top row has 5 neighbors, the zoom-0 world
/// tile has none).
pub fn neighbors(addr: &TileAddress) -> Vec<TileAddress> {
    let n = 1u32 << addr.zoom;
    if n == 1 {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(8);
    for dy in -1i64..=1 {
        let y = addr.y as i64 + dy;
        if y < 0 || y >= n as i64 {
            continue;
        }
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            // Wrap columns around the antimeridian.
            let x = (addr.x as i64 + dx).rem_euclid(n as i64);
            let candidate = TileAddress {
                x: x as u32,
                y: y as u32,
                zoom: addr.zoom,
            };
            if candidate != *addr && !result.contains(&candidate) {
                result.push(candidate);
            }
        }
    }
    result
}

/// Returns every tile address at `zoom` whose bounds intersect `rect`.
///
/// Used by the store to resolve query rectangles to candidate tiles. The
/// rectangle is clamped to the Web Mercator latitude range.
pub fn covering(zoom: u8, rect: &Rect) -> Result<Vec<TileAddress>, CoordError> {
    let lat_min = rect.min_lat.max(MIN_LAT);
    let lat_max = rect.max_lat.min(MAX_LAT);
    let lon_min = rect.min_lon.max(MIN_LON);
    // lon == 180 addresses column 0 (antimeridian wrap); keep the southeast
    // corner in the last column so the row ranges below stay ordered.
    let lon_max = rect.max_lon.min(MAX_LON - 1e-9);
    if lat_min > lat_max || lon_min > lon_max {
        return Ok(Vec::new());
    }

    // Northwest corner gives the smallest x/y, southeast the largest.
    let nw = tile_address(zoom, lon_min, lat_max)?;
    let se = tile_address(zoom, lon_max, lat_min)?;

    let mut tiles = Vec::with_capacity(
        ((se.x - nw.x + 1) as usize).saturating_mul((se.y - nw.y + 1) as usize),
    );
    for y in nw.y..=se.y {
        for x in nw.x..=se.x {
            tiles.push(TileAddress { x, y, zoom });
        }
    }
    Ok(tiles)
}

/// Returns the tile address owning a geographic point.
///
/// Convenience wrapper over [`tile_address`] for [`LonLat`] values.
#[inline]
pub fn tile_of(zoom: u8, point: LonLat) -> Result<TileAddress, CoordError> {
    tile_address(zoom, point.lon, point.lat)
}
