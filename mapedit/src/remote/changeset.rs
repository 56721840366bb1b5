//! Accumulated local diffs awaiting commit.

use crate::geom::{Feature, FeatureId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps provisional local ids to the server-assigned ids returned by a
/// successful commit.
pub type IdMap = HashMap<FeatureId, FeatureId>;

/// A local diff against the last committed remote state.
///
/// `put` carries full snapshots of added and modified features (provisional
/// ids included, so the server can key its id map to them); `remove` lists
/// previously committed features deleted locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Features to create or overwrite.
    pub put: Vec<Feature>,
    /// Ids of committed features to delete.
    pub remove: Vec<FeatureId>,
}

impl ChangeSet {
    /// Returns true if the change set carries no diffs.
    pub fn is_empty(&self) -> bool {
        self.put.is_empty() && self.remove.is_empty()
    }

    /// Total number of diffs.
    pub fn len(&self) -> usize {
        self.put.len() + self.remove.len()
    }
}

/// Result of a successful batch commit.
#[derive(Debug, Clone, Default)]
pub struct CommitResponse {
    /// Provisional-to-server id translations.
    pub id_map: IdMap,
    /// Per-feature soft errors reported by the service (commit still
    /// succeeded as a whole).
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Geometry, LonLat};

    #[test]
    fn test_empty() {
        let cs = ChangeSet::default();
        assert!(cs.is_empty());
        assert_eq!(cs.len(), 0);
    }

    #[test]
    fn test_serde_shape() {
        let cs = ChangeSet {
            put: vec![Feature::with_id(
                FeatureId::Local(3),
                Geometry::Point(LonLat::new(1.0, 2.0)),
            )],
            remove: vec![FeatureId::Remote("road-9".into())],
        };
        let json = serde_json::to_value(&cs).unwrap();
        assert_eq!(json["put"][0]["id"], 3);
        assert_eq!(json["remove"][0], "road-9");
        let back: ChangeSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, cs);
    }
}
