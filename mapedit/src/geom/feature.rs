//! Features: identity, geometry, and open properties.

use super::Geometry;
use crate::style::StyleMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Open key/value property map attached to a feature.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Feature identity, unique within one provider.
///
/// `Local` ids are provisional, assigned by the provider before the remote
/// backend has seen the feature; a successful commit re-keys them to the
/// server-assigned `Remote` form via the returned id map. Serialized
/// untagged, so local ids travel as JSON numbers and remote ids as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// Provisional, locally assigned id.
    Local(u64),
    /// Server-assigned id.
    Remote(String),
}

impl FeatureId {
    /// Returns true if this id is provisional (never committed).
    pub fn is_provisional(&self) -> bool {
        matches!(self, FeatureId::Local(_))
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureId::Local(n) => write!(f, "local:{}", n),
            FeatureId::Remote(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        FeatureId::Remote(s.to_string())
    }
}

/// A vector feature: identity, geometry, properties, optional style.
///
/// Deep [`Clone`] is what history snapshots rely on: a cloned feature shares
/// no mutable state with the live record, so restoring it reproduces the
/// exact pre-edit state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Identity, absent until the provider assigns a provisional id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    /// Geometry.
    pub geometry: Geometry,
    /// Open property map.
    #[serde(default)]
    pub properties: Properties,
    /// Per-feature style expression overrides, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleMap>,
}

impl Feature {
    /// Creates a feature with no id and empty properties.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry,
            properties: Properties::new(),
            style: None,
        }
    }

    /// Creates a feature with a known id.
    pub fn with_id(id: FeatureId, geometry: Geometry) -> Self {
        Self {
            id: Some(id),
            geometry,
            properties: Properties::new(),
            style: None,
        }
    }

    /// Sets a property, builder style.
    pub fn prop(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Feature-level validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeomError {
    /// Geometry failed structural or range validation.
    #[error("invalid geometry")]
    InvalidGeometry,
}
