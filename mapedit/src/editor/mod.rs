//! The editor facade: providers, shared history, and background tasks.
//!
//! An [`Editor`] ties the pieces together for a host application. It owns
//! the per-layer [`Provider`]s, the shared [`HistoryManager`] they record
//! into, and the cooperative [`TaskManager`] for background work. Undo and
//! redo live here rather than on the providers, since one history step can
//! span features from several layers.
//!
//! The host loop calls [`pump`](Editor::pump) and
//! [`tick`](Editor::tick) between frames; everything else is synchronous
//! except [`commit`](Editor::commit).

mod link;

pub use link::{LinkEnd, SnapOutcome, DEFAULT_SNAP_TOLERANCE_M};

use crate::geom::FeatureId;
use crate::history::{EditKind, HistoryManager, HistoryStep};
use crate::remote::{IdMap, RemoteError, RetryPolicy, TileService};
use crate::sched::TaskManager;
use crate::store::{
    Provider, ProviderConfig, ReindexResult, ReindexTask, StoreEvent,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Central coordinator for an editing session.
pub struct Editor {
    providers: BTreeMap<String, Provider>,
    history: Arc<Mutex<HistoryManager>>,
    tasks: TaskManager,
    reindex_tx: mpsc::UnboundedSender<ReindexResult>,
    reindex_rx: mpsc::UnboundedReceiver<ReindexResult>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    /// Creates an empty editor session.
    pub fn new() -> Self {
        let (reindex_tx, reindex_rx) = mpsc::unbounded_channel();
        Self {
            providers: BTreeMap::new(),
            history: Arc::new(Mutex::new(HistoryManager::new())),
            tasks: TaskManager::new(),
            reindex_tx,
            reindex_rx,
        }
    }

    /// Registers a local-only provider. Returns its store event stream.
    ///
    /// A provider id already in use is replaced, dropping the old provider's
    /// state.
    pub fn add_provider(&mut self, config: ProviderConfig) -> mpsc::UnboundedReceiver<StoreEvent> {
        let id = config.id.clone();
        let (provider, events) = Provider::new(config, Arc::clone(&self.history));
        if self.providers.insert(id.clone(), provider).is_some() {
            warn!(provider = %id, "replaced existing provider");
        }
        events
    }

    /// Registers a provider backed by a remote tile service.
    pub fn add_remote_provider(
        &mut self,
        config: ProviderConfig,
        service: Arc<dyn TileService>,
        retry: RetryPolicy,
    ) -> mpsc::UnboundedReceiver<StoreEvent> {
        let id = config.id.clone();
        let (provider, events) = Provider::new(config, Arc::clone(&self.history));
        let provider = provider.with_remote(service, retry);
        if self.providers.insert(id.clone(), provider).is_some() {
            warn!(provider = %id, "replaced existing provider");
        }
        events
    }

    /// Looks up a provider by id.
    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    /// Looks up a provider mutably by id.
    pub fn provider_mut(&mut self, id: &str) -> Option<&mut Provider> {
        self.providers.get_mut(id)
    }

    /// Ids of all registered providers.
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Shared history handle (for observers).
    pub fn history(&self) -> Arc<Mutex<HistoryManager>> {
        Arc::clone(&self.history)
    }

    /// Background task scheduler.
    pub fn tasks_mut(&mut self) -> &mut TaskManager {
        &mut self.tasks
    }

    // =========================================================================
    // Undo / redo
    // =========================================================================

    /// Undoes the most recent history step. Returns false at the start of
    /// history.
    ///
    /// Operations revert in reverse recording order, so intra-step
    /// dependencies (a split's add after its modify) unwind correctly.
    pub fn undo(&mut self) -> bool {
        let step = self.history.lock().step_back();
        let Some(step) = step else {
            return false;
        };
        debug!(ops = step.ops().len(), "undo");
        self.revert_step(&step);
        true
    }

    /// Re-applies the step most recently undone. Returns false at the end
    /// of history.
    pub fn redo(&mut self) -> bool {
        let step = self.history.lock().step_forward();
        let Some(step) = step else {
            return false;
        };
        debug!(ops = step.ops().len(), "redo");
        self.apply_step(&step);
        true
    }

    /// Undoes every applied step and discards the history, returning the
    /// session to its last committed state with nothing pending.
    ///
    /// Unlike repeated [`undo`](Self::undo), the reverted steps cannot be
    /// redone and no local-only changes are left queued for commit.
    pub fn revert_all(&mut self) {
        let mut undone = 0;
        while self.undo() {
            undone += 1;
        }
        self.history.lock().clear();
        for provider in self.providers.values_mut() {
            provider.reset_pending();
        }
        info!(steps = undone, "reverted all local changes");
    }

    /// Opens a batch: mutations until [`end_batch`](Self::end_batch) form a
    /// single undo step. Nestable.
    pub fn begin_batch(&mut self) {
        self.history.lock().begin_batch();
    }

    /// Closes a batch level.
    pub fn end_batch(&mut self) {
        self.history.lock().end_batch();
    }

    /// Runs `f` inside a batch: every mutation it performs forms a single
    /// undo step.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let result = f(self);
        self.end_batch();
        result
    }

    /// Number of steps that can be undone.
    pub fn undo_steps(&self) -> usize {
        self.history.lock().current()
    }

    /// Number of steps that can be redone.
    pub fn redo_steps(&self) -> usize {
        let history = self.history.lock();
        history.len() - history.current()
    }

    fn revert_step(&mut self, step: &HistoryStep) {
        for op in step.ops().iter().rev() {
            let Some(provider) = self.providers.get_mut(&op.provider) else {
                warn!(provider = %op.provider, "undo references unknown provider");
                continue;
            };
            match &op.kind {
                EditKind::Add { id, .. } => provider.remove_raw(id),
                EditKind::Remove { feature, .. } => provider.restore_raw(feature.clone()),
                EditKind::Modify { before, .. } => provider.replace_raw(before.clone()),
            }
        }
    }

    fn apply_step(&mut self, step: &HistoryStep) {
        for op in step.ops() {
            let Some(provider) = self.providers.get_mut(&op.provider) else {
                warn!(provider = %op.provider, "redo references unknown provider");
                continue;
            };
            match &op.kind {
                EditKind::Add { feature, .. } => provider.restore_raw(feature.clone()),
                EditKind::Remove { id, .. } => provider.remove_raw(id),
                EditKind::Modify { after, .. } => provider.replace_raw(after.clone()),
            }
        }
    }

    // =========================================================================
    // Host loop integration
    // =========================================================================

    /// Drains resolved tile loads and finished re-index plans into the
    /// stores. Returns the number of results applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        for provider in self.providers.values_mut() {
            applied += provider.pump();
        }
        while let Ok(result) = self.reindex_rx.try_recv() {
            if let Some(provider) = self.providers.get_mut(&result.provider) {
                provider.apply_reindex(result.margin_m, result.assignments);
                applied += 1;
            }
        }
        applied
    }

    /// Runs one slice of the highest-priority background task. Returns true
    /// if a task ran.
    pub fn tick(&mut self) -> bool {
        self.tasks.tick()
    }

    /// Changes a provider's indexing margin, re-indexing in the background.
    ///
    /// The plan is computed by a sliced task over a feature snapshot and
    /// applied on a later [`pump`](Self::pump). Returns false for an unknown
    /// provider.
    pub fn set_margin(&mut self, provider_id: &str, margin_m: f64) -> bool {
        let Some(provider) = self.providers.get(provider_id) else {
            return false;
        };
        let task = ReindexTask::new(
            provider_id,
            provider.indexing_zoom(),
            margin_m,
            provider.feature_snapshots(),
            self.reindex_tx.clone(),
        );
        self.tasks.start(task);
        true
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Commits one provider's pending changes.
    pub async fn commit(&mut self, provider_id: &str) -> Result<IdMap, RemoteError> {
        let Some(provider) = self.providers.get_mut(provider_id) else {
            return Err(RemoteError::permanent(format!(
                "unknown provider {provider_id}"
            )));
        };
        provider.commit().await
    }

    /// Commits every provider in turn, stopping at the first failure.
    ///
    /// Providers committed before the failure stay committed; the failing
    /// provider's changes remain pending.
    pub async fn commit_all(&mut self) -> Result<BTreeMap<String, IdMap>, RemoteError> {
        let ids: Vec<String> = self.providers.keys().cloned().collect();
        let mut maps = BTreeMap::new();
        for id in ids {
            let id_map = self.commit(&id).await?;
            maps.insert(id, id_map);
        }
        Ok(maps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Feature, Geometry, LonLat};
    use crate::remote::MockTileService;
    use crate::store::{Query, QueryResult};

    fn point(lon: f64, lat: f64) -> Feature {
        Feature::new(Geometry::Point(LonLat::new(lon, lat)))
    }

    fn editor_with(provider: &str) -> Editor {
        let mut editor = Editor::new();
        editor.add_provider(ProviderConfig::new(provider));
        editor
    }

    fn count_at(editor: &Editor, provider: &str, lon: f64, lat: f64) -> usize {
        editor
            .provider(provider)
            .unwrap()
            .search(&Query::radius(LonLat::new(lon, lat), 50.0))
            .count()
    }

    #[test]
    fn test_undo_redo_add() {
        let mut editor = editor_with("layer");
        let id = editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(13.4, 52.5), None)
            .unwrap();

        assert!(editor.undo());
        assert_eq!(editor.provider("layer").unwrap().feature_count(), 0);

        assert!(editor.redo());
        assert_eq!(editor.provider("layer").unwrap().feature_count(), 1);
        let found = editor.provider("layer").unwrap().search(&Query::Id(id));
        assert!(matches!(found, QueryResult::One(Some(_))));
    }

    #[test]
    fn test_undo_restores_exact_pre_edit_state() {
        let mut editor = editor_with("layer");
        let id = editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(13.4, 52.5), None)
            .unwrap();

        editor.provider_mut("layer").unwrap().modify_feature(&id, |f| {
            f.geometry = Geometry::Point(LonLat::new(9.0, 48.0));
        });
        // Mutate again so the undo target is not the live state.
        editor.provider_mut("layer").unwrap().modify_feature(&id, |f| {
            f.geometry = Geometry::Point(LonLat::new(2.0, 41.0));
        });

        editor.undo();
        assert_eq!(count_at(&editor, "layer", 9.0, 48.0), 1);
        editor.undo();
        assert_eq!(count_at(&editor, "layer", 13.4, 52.5), 1);
        assert_eq!(count_at(&editor, "layer", 9.0, 48.0), 0);
    }

    #[test]
    fn test_undo_at_bounds_is_noop() {
        let mut editor = editor_with("layer");
        assert!(!editor.undo());
        assert!(!editor.redo());

        editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(1.0, 1.0), None);
        assert!(!editor.redo());
        assert!(editor.undo());
        assert!(!editor.undo());
    }

    #[test]
    fn test_batch_is_one_undo_step() {
        let mut editor = editor_with("layer");
        editor.begin_batch();
        for i in 0..5 {
            editor
                .provider_mut("layer")
                .unwrap()
                .add_feature(point(f64::from(i), 10.0), None);
        }
        editor.end_batch();

        assert_eq!(editor.undo_steps(), 1);
        assert!(editor.undo());
        assert_eq!(editor.provider("layer").unwrap().feature_count(), 0);
        assert!(editor.redo());
        assert_eq!(editor.provider("layer").unwrap().feature_count(), 5);
    }

    #[test]
    fn test_cross_provider_batch_undo() {
        let mut editor = Editor::new();
        editor.add_provider(ProviderConfig::new("roads"));
        editor.add_provider(ProviderConfig::new("pois"));

        editor.begin_batch();
        editor
            .provider_mut("roads")
            .unwrap()
            .add_feature(point(1.0, 1.0), None);
        editor
            .provider_mut("pois")
            .unwrap()
            .add_feature(point(2.0, 2.0), None);
        editor.end_batch();

        assert!(editor.undo());
        assert_eq!(editor.provider("roads").unwrap().feature_count(), 0);
        assert_eq!(editor.provider("pois").unwrap().feature_count(), 0);
    }

    #[test]
    fn test_revert_all_discards_history_and_pending_changes() {
        let mut editor = editor_with("layer");
        for i in 0..4 {
            editor
                .provider_mut("layer")
                .unwrap()
                .add_feature(point(f64::from(i), 5.0), None);
        }
        editor.revert_all();

        let store = editor.provider("layer").unwrap();
        assert_eq!(store.feature_count(), 0);
        assert!(store.pending_changes().is_empty());
        assert_eq!(editor.undo_steps(), 0);
        assert_eq!(editor.redo_steps(), 0, "reverted steps are discarded");
        assert!(!editor.redo());
    }

    #[test]
    fn test_revert_all_after_remove_leaves_nothing_pending() {
        let mut editor = editor_with("layer");
        let id = FeatureId::Remote("road-1".to_string());
        editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(
                Feature::with_id(id.clone(), Geometry::Point(LonLat::new(4.0, 4.0))),
                None,
            )
            .unwrap();
        editor.provider_mut("layer").unwrap().remove_feature(&id);

        editor.revert_all();
        let store = editor.provider("layer").unwrap();
        assert_eq!(store.feature_count(), 0);
        assert!(store.pending_changes().is_empty());
    }

    #[test]
    fn test_new_edit_after_undo_discards_redo() {
        let mut editor = editor_with("layer");
        editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(1.0, 1.0), None);
        editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(2.0, 2.0), None);

        editor.undo();
        editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(3.0, 3.0), None);

        assert_eq!(editor.redo_steps(), 0);
        assert!(!editor.redo());
    }

    #[test]
    fn test_set_margin_reindexes_in_background() {
        let mut editor = editor_with("layer");
        let id = editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(13.4, 52.5), None)
            .unwrap();

        assert!(editor.set_margin("layer", 500.0));
        assert!(!editor.set_margin("missing", 500.0));

        while editor.tick() {}
        editor.pump();

        // A 500 m margin pushes the point into neighboring tiles as well.
        let tiles = editor.provider("layer").unwrap().tiles_of(&id).unwrap();
        assert!(tiles.len() > 1);
    }

    #[tokio::test]
    async fn test_commit_unknown_provider() {
        let mut editor = Editor::new();
        let err = editor.commit("nope").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_undo_after_commit_follows_rekeyed_id() {
        let mut editor = Editor::new();
        editor.add_remote_provider(
            ProviderConfig::new("layer"),
            MockTileService::new(),
            RetryPolicy::None,
        );

        let store = editor.provider_mut("layer").unwrap();
        let id = store.add_feature(point(13.4, 52.5), None).unwrap();
        store.modify_feature(&id, |f| {
            f.geometry = Geometry::Point(LonLat::new(9.0, 48.0));
        });

        let id_map = editor.commit("layer").await.unwrap();
        let server_id = id_map.get(&id).cloned().unwrap();

        // Undo of the modify reverts the live, re-keyed feature instead of
        // resurrecting a second copy under the dead provisional id.
        assert!(editor.undo());
        let store = editor.provider("layer").unwrap();
        assert_eq!(store.feature_count(), 1);
        let feature = store
            .search(&Query::Id(server_id.clone()))
            .features()
            .pop()
            .unwrap();
        assert_eq!(feature.geometry, Geometry::Point(LonLat::new(13.4, 52.5)));

        // Undo of the add removes the committed feature and queues its
        // remote deletion.
        assert!(editor.undo());
        let store = editor.provider("layer").unwrap();
        assert_eq!(store.feature_count(), 0);
        assert_eq!(store.pending_changes().remove, vec![server_id]);
    }

    #[test]
    fn test_undo_of_remove_unqueues_pending_deletion() {
        let mut editor = editor_with("layer");
        let id = FeatureId::Remote("road-1".to_string());
        editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(
                Feature::with_id(id.clone(), Geometry::Point(LonLat::new(8.0, 47.0))),
                None,
            )
            .unwrap();
        editor.provider_mut("layer").unwrap().remove_feature(&id);
        assert_eq!(
            editor.provider("layer").unwrap().pending_changes().remove,
            vec![id.clone()]
        );

        assert!(editor.undo());
        let pending = editor.provider("layer").unwrap().pending_changes();
        assert!(pending.remove.is_empty(), "restored feature is live again");
        assert_eq!(pending.put.len(), 1);
        assert_eq!(pending.put[0].id, Some(id));
    }
}
