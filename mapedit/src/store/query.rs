//! Query types for the feature store.

use crate::geom::{Feature, FeatureId, LonLat, Rect};

/// A search against one provider.
#[derive(Debug, Clone)]
pub enum Query {
    /// Look up one feature by id.
    Id(FeatureId),
    /// Look up several features by id; result slots align with the input.
    Ids(Vec<FeatureId>),
    /// All features within a great-circle radius of a point.
    Radius {
        /// Center of the search.
        center: LonLat,
        /// Radius in meters. Must be non-negative.
        radius_m: f64,
    },
    /// All features whose geometry bounding box intersects a rectangle.
    Rect(Rect),
}

impl Query {
    /// Convenience constructor for a radius query.
    pub fn radius(center: LonLat, radius_m: f64) -> Self {
        Self::Radius { center, radius_m }
    }
}

/// Result of a [`Query`], shaped after the query variant.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// `Id` queries: the feature, or `None` when absent.
    One(Option<Feature>),
    /// `Ids` queries: one slot per requested id, `None` where absent.
    Many(Vec<Option<Feature>>),
    /// Spatial queries: matching features, each exactly once.
    Features(Vec<Feature>),
}

impl QueryResult {
    /// Unwraps a spatial result set; empty for id-shaped results.
    pub fn features(self) -> Vec<Feature> {
        match self {
            QueryResult::Features(features) => features,
            QueryResult::One(found) => found.into_iter().collect(),
            QueryResult::Many(slots) => slots.into_iter().flatten().collect(),
        }
    }

    /// Number of features present in the result.
    pub fn count(&self) -> usize {
        match self {
            QueryResult::One(found) => usize::from(found.is_some()),
            QueryResult::Many(slots) => slots.iter().filter(|s| s.is_some()).count(),
            QueryResult::Features(features) => features.len(),
        }
    }
}
