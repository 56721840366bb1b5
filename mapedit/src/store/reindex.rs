//! Background re-indexing of a provider's features.
//!
//! Changing the margin (or re-tuning the grid) invalidates every feature's
//! tile membership. Recomputing that for a large store would stall an
//! interactive host, so the work runs as a [`SlicedTask`]: one feature per
//! `exec` quantum, result delivered on a channel once complete. The editor
//! applies the finished plan atomically via
//! [`Provider::apply_reindex`](super::Provider::apply_reindex).

use super::provider::plan_assignment;
use crate::coord::TileAddress;
use crate::geom::{Feature, FeatureId};
use crate::sched::{Priority, SlicedTask, TaskState};
use tokio::sync::mpsc;
use tracing::debug;

/// Completed re-index plan for one provider.
#[derive(Debug)]
pub struct ReindexResult {
    /// Provider the plan belongs to.
    pub provider: String,
    /// Margin the plan was computed for.
    pub margin_m: f64,
    /// Tile membership per feature; the bool marks ghost entries.
    pub assignments: Vec<(FeatureId, Vec<(TileAddress, bool)>)>,
}

/// Sliced task computing new tile assignments for a feature snapshot.
///
/// Operates on a snapshot taken at planning time; features edited while the
/// task runs keep their live membership (the provider re-indexes them on the
/// edit path anyway), so applying a slightly stale plan is safe.
pub struct ReindexTask {
    provider: String,
    zoom: u8,
    margin_m: f64,
    features: std::vec::IntoIter<Feature>,
    assignments: Vec<(FeatureId, Vec<(TileAddress, bool)>)>,
    done_tx: mpsc::UnboundedSender<ReindexResult>,
}

impl ReindexTask {
    /// Plans a re-index of `features` at the given margin.
    pub fn new(
        provider: impl Into<String>,
        zoom: u8,
        margin_m: f64,
        features: Vec<Feature>,
        done_tx: mpsc::UnboundedSender<ReindexResult>,
    ) -> Self {
        Self {
            provider: provider.into(),
            zoom,
            margin_m,
            features: features.into_iter(),
            assignments: Vec::new(),
            done_tx,
        }
    }
}

impl SlicedTask for ReindexTask {
    fn name(&self) -> &str {
        "reindex"
    }

    fn priority(&self) -> Priority {
        Priority::HOUSEKEEPING
    }

    fn init(&mut self) {
        debug!(
            provider = %self.provider,
            remaining = self.features.len(),
            margin_m = self.margin_m,
            "re-index started"
        );
    }

    fn exec(&mut self) -> TaskState {
        let Some(feature) = self.features.next() else {
            return TaskState::Done;
        };
        let Some(id) = feature.id.clone() else {
            return TaskState::Continue;
        };
        if let Some(assignment) = plan_assignment(self.zoom, self.margin_m, &feature) {
            self.assignments.push((id, assignment));
        }
        TaskState::Continue
    }

    fn on_done(&mut self) {
        debug!(
            provider = %self.provider,
            features = self.assignments.len(),
            "re-index plan complete"
        );
        let _ = self.done_tx.send(ReindexResult {
            provider: self.provider.clone(),
            margin_m: self.margin_m,
            assignments: std::mem::take(&mut self.assignments),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Geometry, LonLat};
    use crate::sched::TaskManager;
    use crate::store::provider::DEFAULT_MARGIN_M;

    fn feature(n: u64, lon: f64, lat: f64) -> Feature {
        Feature::with_id(FeatureId::Local(n), Geometry::Point(LonLat::new(lon, lat)))
    }

    #[test]
    fn test_reindex_runs_to_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let features = vec![
            feature(1, 13.4, 52.5),
            feature(2, 9.2, 48.7),
            feature(3, -0.1, 51.5),
        ];
        let mut manager = TaskManager::new();
        manager.start(ReindexTask::new("layer", 14, DEFAULT_MARGIN_M, features, tx));
        manager.run_until_idle();

        let result = rx.try_recv().unwrap();
        assert_eq!(result.provider, "layer");
        assert_eq!(result.assignments.len(), 3);
        for (_, assignment) in &result.assignments {
            assert!(!assignment.is_empty());
            assert!(!assignment[0].1, "first entry is the primary tile");
        }
    }

    #[test]
    fn test_reindex_skips_id_less_features() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let anonymous = Feature::new(Geometry::Point(LonLat::new(1.0, 1.0)));
        let mut manager = TaskManager::new();
        manager.start(ReindexTask::new(
            "layer",
            14,
            DEFAULT_MARGIN_M,
            vec![anonymous, feature(7, 2.0, 2.0)],
            tx,
        ));
        manager.run_until_idle();

        let result = rx.try_recv().unwrap();
        assert_eq!(result.assignments.len(), 1);
        assert_eq!(result.assignments[0].0, FeatureId::Local(7));
    }
}
