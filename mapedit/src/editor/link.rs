//! Link snapping: merging and splitting connected line features.
//!
//! Dragging a line endpoint near another line snaps the network together:
//!
//! * endpoint onto another line's endpoint: the two lines merge into one,
//! * endpoint onto another line's interior: the target splits there and the
//!   endpoint connects to the split point,
//! * two lines crossing: [`Editor::split_crossing`] splits both at the
//!   intersection, turning two lines into four.
//!
//! Every snap runs as one batch, so a single undo restores the pre-snap
//! network exactly.

use super::Editor;
use crate::geom::{distance_m, Feature, FeatureId, Geometry, LonLat};
use crate::store::Query;
use tracing::debug;

/// Default snap tolerance in meters.
pub const DEFAULT_SNAP_TOLERANCE_M: f64 = 2.0;

/// Which end of a line is being snapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEnd {
    /// First coordinate.
    Start,
    /// Last coordinate.
    End,
}

/// Features touched by a snap operation.
#[derive(Debug, Default)]
pub struct SnapOutcome {
    /// Features whose geometry changed.
    pub changed: Vec<FeatureId>,
    /// Features removed (merged away).
    pub removed: Vec<FeatureId>,
    /// Features created (split remainders).
    pub added: Vec<FeatureId>,
}

impl Editor {
    /// Snaps one end of a line onto the nearest line within `tolerance_m`.
    ///
    /// Returns `None` when the feature is not a line or nothing snappable is
    /// in range; the store is untouched in that case. The snap target's
    /// closest approach decides the shape of the edit: an endpoint within
    /// tolerance merges the two lines into one, anywhere else splits the
    /// target at the closest interior point.
    pub fn snap_link(
        &mut self,
        provider_id: &str,
        id: &FeatureId,
        end: LinkEnd,
        tolerance_m: f64,
    ) -> Option<SnapOutcome> {
        let provider = self.provider(provider_id)?;
        let line = line_coords(provider.search(&Query::Id(id.clone())).features().pop()?)?;
        let endpoint = match end {
            LinkEnd::Start => *line.first()?,
            LinkEnd::End => *line.last()?,
        };

        // Nearest other line within tolerance.
        let target = provider
            .search(&Query::radius(endpoint, tolerance_m))
            .features()
            .into_iter()
            .filter(|f| f.id.as_ref() != Some(id))
            .filter(|f| matches!(f.geometry, Geometry::LineString(_)))
            .min_by(|a, b| {
                a.geometry
                    .distance_to(endpoint)
                    .total_cmp(&b.geometry.distance_to(endpoint))
            })?;
        let target_id = target.id.clone()?;
        let target_line = line_coords(target.clone())?;

        let endpoint_hit = [*target_line.first()?, *target_line.last()?]
            .into_iter()
            .enumerate()
            .filter(|(_, p)| distance_m(endpoint, *p) <= tolerance_m)
            .min_by(|(_, a), (_, b)| {
                distance_m(endpoint, *a).total_cmp(&distance_m(endpoint, *b))
            });

        let outcome = if let Some((which, _)) = endpoint_hit {
            debug!(%id, target = %target_id, "snap: endpoint merge");
            self.merge_lines(provider_id, id, end, line, &target_id, target_line, which == 1)
        } else {
            let (split_point, seg) = closest_on_polyline(endpoint, &target_line)?;
            debug!(%id, target = %target_id, segment = seg, "snap: interior split");
            self.split_target(
                provider_id,
                id,
                end,
                line,
                &target,
                &target_id,
                target_line,
                split_point,
                seg,
            )
        };
        Some(outcome)
    }

    /// Splits two crossing lines at their first intersection point.
    ///
    /// Each line becomes two, connected at the crossing: two features in,
    /// four out. Returns `None` (store untouched) when either feature is not
    /// a line or the lines do not cross.
    pub fn split_crossing(
        &mut self,
        provider_id: &str,
        a: &FeatureId,
        b: &FeatureId,
    ) -> Option<SnapOutcome> {
        let provider = self.provider(provider_id)?;
        let feature_a = provider.search(&Query::Id(a.clone())).features().pop()?;
        let feature_b = provider.search(&Query::Id(b.clone())).features().pop()?;
        let line_a = line_coords(feature_a.clone())?;
        let line_b = line_coords(feature_b.clone())?;

        let (crossing, seg_a, seg_b) = first_crossing(&line_a, &line_b)?;
        debug!(%a, %b, "splitting crossing lines");

        let mut outcome = SnapOutcome::default();
        self.begin_batch();
        let (first_a, second_a) = split_at(&line_a, seg_a, crossing);
        let (first_b, second_b) = split_at(&line_b, seg_b, crossing);

        let provider = self
            .provider_mut(provider_id)
            .unwrap_or_else(|| unreachable!("looked up above"));
        provider.modify_feature(a, |f| f.geometry = Geometry::LineString(first_a));
        provider.modify_feature(b, |f| f.geometry = Geometry::LineString(first_b));
        let tail_a = remainder_of(&feature_a, second_a);
        let tail_b = remainder_of(&feature_b, second_b);
        if let Some(new_id) = provider.add_feature(tail_a, None) {
            outcome.added.push(new_id);
        }
        if let Some(new_id) = provider.add_feature(tail_b, None) {
            outcome.added.push(new_id);
        }
        self.end_batch();

        outcome.changed = vec![a.clone(), b.clone()];
        Some(outcome)
    }

    /// Endpoint-to-endpoint merge: the two lines become one feature.
    #[allow(clippy::too_many_arguments)]
    fn merge_lines(
        &mut self,
        provider_id: &str,
        id: &FeatureId,
        end: LinkEnd,
        mut line: Vec<LonLat>,
        target_id: &FeatureId,
        mut target_line: Vec<LonLat>,
        matched_target_end: bool,
    ) -> SnapOutcome {
        // Orient our line so the snapping endpoint is last, the target so
        // its matched endpoint is first, then chain them. The shared vertex
        // comes from the target: that is the snap.
        if end == LinkEnd::Start {
            line.reverse();
        }
        if matched_target_end {
            target_line.reverse();
        }
        line.pop();
        line.extend(target_line);

        self.begin_batch();
        let provider = self
            .provider_mut(provider_id)
            .unwrap_or_else(|| unreachable!("looked up above"));
        provider.modify_feature(id, |f| f.geometry = Geometry::LineString(line));
        provider.remove_feature(target_id);
        self.end_batch();

        SnapOutcome {
            changed: vec![id.clone()],
            removed: vec![target_id.clone()],
            added: Vec::new(),
        }
    }

    /// Endpoint-to-interior split: the target splits at the closest point,
    /// our endpoint moves onto it.
    #[allow(clippy::too_many_arguments)]
    fn split_target(
        &mut self,
        provider_id: &str,
        id: &FeatureId,
        end: LinkEnd,
        mut line: Vec<LonLat>,
        target: &Feature,
        target_id: &FeatureId,
        target_line: Vec<LonLat>,
        split_point: LonLat,
        seg: usize,
    ) -> SnapOutcome {
        let moved = match end {
            LinkEnd::Start => 0,
            LinkEnd::End => line.len() - 1,
        };
        line[moved] = split_point;
        let (first, second) = split_at(&target_line, seg, split_point);

        let mut outcome = SnapOutcome {
            changed: vec![id.clone(), target_id.clone()],
            removed: Vec::new(),
            added: Vec::new(),
        };

        self.begin_batch();
        let provider = self
            .provider_mut(provider_id)
            .unwrap_or_else(|| unreachable!("looked up above"));
        provider.modify_feature(id, |f| f.geometry = Geometry::LineString(line));
        provider.modify_feature(target_id, |f| f.geometry = Geometry::LineString(first));
        if let Some(new_id) = provider.add_feature(remainder_of(target, second), None) {
            outcome.added.push(new_id);
        }
        self.end_batch();
        outcome
    }
}

fn line_coords(feature: Feature) -> Option<Vec<LonLat>> {
    match feature.geometry {
        Geometry::LineString(coords) => Some(coords),
        _ => None,
    }
}

/// A new feature carrying the split remainder, inheriting the parent's
/// properties and style but not its identity.
fn remainder_of(parent: &Feature, coords: Vec<LonLat>) -> Feature {
    Feature {
        id: None,
        geometry: Geometry::LineString(coords),
        properties: parent.properties.clone(),
        style: parent.style.clone(),
    }
}

/// Splits a polyline at a point on segment `seg` into two polylines that
/// share the split point.
fn split_at(line: &[LonLat], seg: usize, point: LonLat) -> (Vec<LonLat>, Vec<LonLat>) {
    let mut first: Vec<LonLat> = line[..=seg].to_vec();
    first.push(point);
    let mut second = vec![point];
    second.extend_from_slice(&line[seg + 1..]);
    (first, second)
}

/// Closest point on a polyline to `p`, with the segment index it lies on.
fn closest_on_polyline(p: LonLat, line: &[LonLat]) -> Option<(LonLat, usize)> {
    let mut best: Option<(LonLat, usize, f64)> = None;
    for (i, seg) in line.windows(2).enumerate() {
        let candidate = closest_on_segment(p, seg[0], seg[1]);
        let d = distance_m(p, candidate);
        if best.map_or(true, |(_, _, bd)| d < bd) {
            best = Some((candidate, i, d));
        }
    }
    best.map(|(point, seg, _)| (point, seg))
}

/// Closest point on the segment `a`-`b` to `p`, in the local
/// equirectangular plane around `p`.
fn closest_on_segment(p: LonLat, a: LonLat, b: LonLat) -> LonLat {
    let cos_lat = p.lat.to_radians().cos().max(1e-12);
    let (ax, ay) = (a.lon * cos_lat, a.lat);
    let (bx, by) = (b.lon * cos_lat, b.lat);
    let (px, py) = (p.lon * cos_lat, p.lat);

    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    LonLat::new(a.lon + t * (b.lon - a.lon), a.lat + t * (b.lat - a.lat))
}

/// First intersection of two polylines, with the segment index on each.
fn first_crossing(a: &[LonLat], b: &[LonLat]) -> Option<(LonLat, usize, usize)> {
    for (i, sa) in a.windows(2).enumerate() {
        for (j, sb) in b.windows(2).enumerate() {
            if let Some(x) = segment_intersection(sa[0], sa[1], sb[0], sb[1]) {
                return Some((x, i, j));
            }
        }
    }
    None
}

/// Proper intersection of two segments in the lon/lat plane.
///
/// Planar math is sufficient at snapping scale; collinear overlaps and
/// shared endpoints return `None` (nothing to split there).
fn segment_intersection(p1: LonLat, p2: LonLat, q1: LonLat, q2: LonLat) -> Option<LonLat> {
    let (rx, ry) = (p2.lon - p1.lon, p2.lat - p1.lat);
    let (sx, sy) = (q2.lon - q1.lon, q2.lat - q1.lat);
    let denom = rx * sy - ry * sx;
    if denom.abs() < 1e-18 {
        return None;
    }
    let (qx, qy) = (q1.lon - p1.lon, q1.lat - p1.lat);
    let t = (qx * sy - qy * sx) / denom;
    let u = (qx * ry - qy * rx) / denom;
    const EPS: f64 = 1e-9;
    if !(EPS..=1.0 - EPS).contains(&t) || !(EPS..=1.0 - EPS).contains(&u) {
        return None;
    }
    Some(LonLat::new(p1.lon + t * rx, p1.lat + t * ry))
}
