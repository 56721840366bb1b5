//! Vector geometry variants and their spatial predicates.

use super::{distance_m, distance_to_segment_m, LonLat, Rect};
use serde::{Deserialize, Serialize};

/// Vector feature geometry, GeoJSON-style.
///
/// Serialized with a `type` tag and `coordinates` payload, so feature JSON
/// interoperates with GeoJSON tooling:
///
/// ```
/// use mapedit::geom::Geometry;
///
/// let g: Geometry = serde_json::from_str(
///     r#"{"type":"Point","coordinates":[13.4,52.5]}"#,
/// ).unwrap();
/// assert!(matches!(g, Geometry::Point(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// A single position.
    Point(LonLat),
    /// A set of positions.
    MultiPoint(Vec<LonLat>),
    /// A polyline of two or more positions.
    LineString(Vec<LonLat>),
    /// A set of polylines.
    MultiLineString(Vec<Vec<LonLat>>),
    /// An exterior ring plus optional hole rings.
    Polygon(Vec<Vec<LonLat>>),
    /// A set of polygons.
    MultiPolygon(Vec<Vec<Vec<LonLat>>>),
}

impl Geometry {
    /// Returns the bounding box of the geometry.
    ///
    /// Empty multi-geometries produce a degenerate box at the origin; they
    /// are rejected by feature validation before ever being stored.
    pub fn bbox(&self) -> Rect {
        let mut points = self.coordinates();
        let first = points.next().unwrap_or(LonLat::new(0.0, 0.0));
        let mut rect = Rect::from_point(first);
        for p in points {
            rect.extend(&Rect::from_point(p));
        }
        rect
    }

    /// The canonical coordinate used for primary tile ownership.
    ///
    /// Points own themselves; every other variant is owned by its first
    /// coordinate, which is stable across edits that do not touch it.
    pub fn primary_coordinate(&self) -> Option<LonLat> {
        self.coordinates().next()
    }

    /// Iterates over every coordinate in the geometry.
    pub fn coordinates(&self) -> Box<dyn Iterator<Item = LonLat> + '_> {
        match self {
            Geometry::Point(p) => Box::new(std::iter::once(*p)),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => Box::new(ps.iter().copied()),
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                Box::new(lines.iter().flatten().copied())
            }
            Geometry::MultiPolygon(polys) => {
                Box::new(polys.iter().flatten().flatten().copied())
            }
        }
    }

    /// Returns true if every coordinate is finite and in range, and the
    /// variant's structural minimums hold (lines need 2 points, rings 4).
    pub fn is_valid(&self) -> bool {
        if !self.coordinates().all(|p| p.is_valid()) {
            return false;
        }
        match self {
            Geometry::Point(_) => true,
            Geometry::MultiPoint(ps) => !ps.is_empty(),
            Geometry::LineString(ps) => ps.len() >= 2,
            Geometry::MultiLineString(lines) => {
                !lines.is_empty() && lines.iter().all(|l| l.len() >= 2)
            }
            Geometry::Polygon(rings) => {
                !rings.is_empty() && rings.iter().all(|r| r.len() >= 4)
            }
            Geometry::MultiPolygon(polys) => {
                !polys.is_empty()
                    && polys
                        .iter()
                        .all(|rings| !rings.is_empty() && rings.iter().all(|r| r.len() >= 4))
            }
        }
    }

    /// Distance in meters from a point to the closest point of the geometry.
    ///
    /// Lines measure against their segments, polygons against their exterior
    /// ring with 0 for points inside it.
    pub fn distance_to(&self, p: LonLat) -> f64 {
        match self {
            Geometry::Point(q) => distance_m(p, *q),
            Geometry::MultiPoint(qs) => qs
                .iter()
                .map(|q| distance_m(p, *q))
                .fold(f64::INFINITY, f64::min),
            Geometry::LineString(line) => polyline_distance(p, line),
            Geometry::MultiLineString(lines) => lines
                .iter()
                .map(|line| polyline_distance(p, line))
                .fold(f64::INFINITY, f64::min),
            Geometry::Polygon(rings) => polygon_distance(p, rings),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .map(|rings| polygon_distance(p, rings))
                .fold(f64::INFINITY, f64::min),
        }
    }
}

fn polyline_distance(p: LonLat, line: &[LonLat]) -> f64 {
    match line {
        [] => f64::INFINITY,
        [only] => distance_m(p, *only),
        _ => line
            .windows(2)
            .map(|seg| distance_to_segment_m(p, seg[0], seg[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn polygon_distance(p: LonLat, rings: &[Vec<LonLat>]) -> f64 {
    let Some(exterior) = rings.first() else {
        return f64::INFINITY;
    };
    if point_in_ring(p, exterior) {
        return 0.0;
    }
    polyline_distance(p, exterior)
}

/// Ray-casting point-in-ring test.
fn point_in_ring(p: LonLat, ring: &[LonLat]) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if p.lon < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
