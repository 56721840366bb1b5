//! Geometry model.
//!
//! Vector feature geometry (points, lines, polygons and their multi-part
//! forms), geographic primitives, and the distance math shared by radius
//! queries and snapping. Distances use an equirectangular great-circle
//! approximation, which is consistent across the engine and accurate at the
//! scales tiles operate on.

mod feature;
mod geometry;
mod primitives;

pub use feature::{Feature, FeatureId, GeomError, Properties};
pub use geometry::Geometry;
pub use primitives::{LonLat, Rect};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Great-circle distance between two points in meters.
///
/// Equirectangular approximation: exact enough for tile-scale distances and
/// cheap enough to run per candidate feature in radius queries.
#[inline]
pub fn distance_m(a: LonLat, b: LonLat) -> f64 {
    let mid_lat = ((a.lat + b.lat) / 2.0).to_radians();
    let dx = (b.lon - a.lon).to_radians() * mid_lat.cos();
    let dy = (b.lat - a.lat).to_radians();
    EARTH_RADIUS_M * (dx * dx + dy * dy).sqrt()
}

/// Distance in meters from `p` to the segment `a`-`b`.
///
/// Projects into the local equirectangular plane around `p`, then measures
/// against the closest point on the segment.
pub fn distance_to_segment_m(p: LonLat, a: LonLat, b: LonLat) -> f64 {
    let cos_lat = p.lat.to_radians().cos();
    // Local plane coordinates in degrees, longitude scaled by latitude.
    let (px, py) = (p.lon * cos_lat, p.lat);
    let (ax, ay) = (a.lon * cos_lat, a.lat);
    let (bx, by) = (b.lon * cos_lat, b.lat);

    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    let (ex, ey) = (px - cx, py - cy);
    (ex * ex + ey * ey).sqrt() * METERS_PER_DEGREE
}

/// Expands a rectangle by a margin given in meters.
///
/// Longitude expansion is scaled by the rectangle's central latitude so the
/// margin is metrically uniform.
pub fn expand_by_meters(rect: &Rect, margin_m: f64) -> Rect {
    let d_lat = margin_m / METERS_PER_DEGREE;
    let mid_lat = ((rect.min_lat + rect.max_lat) / 2.0).to_radians();
    let d_lon = d_lat / mid_lat.cos().max(1e-6);
    rect.expanded(d_lon, d_lat)
}
