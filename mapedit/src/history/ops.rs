//! Reversible edit operations.

use crate::geom::{Feature, FeatureId};
use std::collections::HashMap;

/// One recorded mutation, carrying the snapshots needed to invert it.
#[derive(Debug, Clone)]
pub struct EditOp {
    /// Id of the provider the mutation was applied to.
    pub provider: String,
    /// The mutation itself.
    pub kind: EditKind,
}

/// The mutation variants.
///
/// Snapshots are deep clones taken at record time. `Add` stores the state
/// after insertion (revert = remove), `Remove` the state before removal
/// (revert = re-insert), `Modify` both sides.
#[derive(Debug, Clone)]
pub enum EditKind {
    /// A feature was added.
    Add {
        /// Assigned feature id.
        id: FeatureId,
        /// Post-insert snapshot.
        feature: Feature,
    },
    /// A feature was removed.
    Remove {
        /// Removed feature id.
        id: FeatureId,
        /// Pre-removal snapshot.
        feature: Feature,
    },
    /// A feature's geometry or properties changed.
    Modify {
        /// Feature id.
        id: FeatureId,
        /// Pre-edit snapshot.
        before: Feature,
        /// Post-edit snapshot.
        after: Feature,
    },
}

impl EditOp {
    /// The id of the feature this operation touches.
    pub fn feature_id(&self) -> &FeatureId {
        match &self.kind {
            EditKind::Add { id, .. } | EditKind::Remove { id, .. } | EditKind::Modify { id, .. } => {
                id
            }
        }
    }

    /// Rewrites the ids this operation references through the map, snapshot
    /// ids included. No-op when the operation's id is not in the map.
    pub(crate) fn rekey(&mut self, id_map: &HashMap<FeatureId, FeatureId>) {
        match &mut self.kind {
            EditKind::Add { id, feature } | EditKind::Remove { id, feature } => {
                if let Some(new) = id_map.get(id) {
                    *id = new.clone();
                    feature.id = Some(new.clone());
                }
            }
            EditKind::Modify { id, before, after } => {
                if let Some(new) = id_map.get(id) {
                    *id = new.clone();
                    before.id = Some(new.clone());
                    after.id = Some(new.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Geometry, LonLat};

    #[test]
    fn test_feature_id_accessor() {
        let id = FeatureId::Local(7);
        let feature = Feature::with_id(id.clone(), Geometry::Point(LonLat::new(0.0, 0.0)));
        let op = EditOp {
            provider: "roads".to_string(),
            kind: EditKind::Remove {
                id: id.clone(),
                feature,
            },
        };
        assert_eq!(op.feature_id(), &id);
    }

    #[test]
    fn test_rekey_rewrites_op_and_snapshots() {
        let old = FeatureId::Local(3);
        let new = FeatureId::Remote("srv-3".to_string());
        let geometry = Geometry::Point(LonLat::new(1.0, 2.0));
        let mut op = EditOp {
            provider: "roads".to_string(),
            kind: EditKind::Modify {
                id: old.clone(),
                before: Feature::with_id(old.clone(), geometry.clone()),
                after: Feature::with_id(old.clone(), geometry),
            },
        };

        op.rekey(&HashMap::from([(old, new.clone())]));
        assert_eq!(op.feature_id(), &new);
        let EditKind::Modify { before, after, .. } = &op.kind else {
            panic!("kind changed");
        };
        assert_eq!(before.id, Some(new.clone()));
        assert_eq!(after.id, Some(new));
    }

    #[test]
    fn test_rekey_ignores_unmapped_ids() {
        let id = FeatureId::Remote("road-1".to_string());
        let mut op = EditOp {
            provider: "roads".to_string(),
            kind: EditKind::Add {
                id: id.clone(),
                feature: Feature::with_id(id.clone(), Geometry::Point(LonLat::new(0.0, 0.0))),
            },
        };
        op.rekey(&HashMap::from([(
            FeatureId::Local(9),
            FeatureId::Remote("srv-9".to_string()),
        )]));
        assert_eq!(op.feature_id(), &id);
    }
}
