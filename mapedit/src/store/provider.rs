//! The feature provider: single source of truth for one layer.

use super::events::StoreEvent;
use super::query::{Query, QueryResult};
use super::tile::{Tile, TileStatus};
use crate::coord::{self, TileAddress, MAX_LAT, MIN_LAT};
use crate::geom::{expand_by_meters, Feature, FeatureId, LonLat, Rect};
use crate::history::{EditKind, EditOp, HistoryManager};
use crate::remote::{ChangeSet, IdMap, RemoteError, RemoteSync, RetryPolicy, TileLoad, TileService};
use crate::style::StyleMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default zoom level features are indexed at.
pub const DEFAULT_INDEXING_ZOOM: u8 = 14;

/// Default margin around tile bounds, in meters.
pub const DEFAULT_MARGIN_M: f64 = 20.0;

/// Provider configuration.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Provider/layer id, used in edit operations and commit URLs.
    pub id: String,
    /// Zoom level of the indexing tile grid.
    pub indexing_zoom: u8,
    /// Margin distance in meters: features this close to a tile boundary
    /// are also indexed in the neighboring tile as ghosts.
    pub margin_m: f64,
}

impl ProviderConfig {
    /// Creates a config with default zoom and margin.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            indexing_zoom: DEFAULT_INDEXING_ZOOM,
            margin_m: DEFAULT_MARGIN_M,
        }
    }
}

/// Local-versus-remote synchronization state of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Matches the last committed remote state.
    Clean,
    /// Locally edited, pending commit.
    Modified,
    /// Part of a commit currently in flight.
    Committing,
}

/// A stored feature plus its bookkeeping.
#[derive(Debug)]
struct FeatureRecord {
    feature: Feature,
    sync: SyncState,
    /// Tiles this feature is indexed under; the primary tile first.
    tiles: Vec<TileAddress>,
}

/// A parked remote search waiting for its tiles to resolve.
struct PendingQuery {
    query: Query,
    remaining: HashSet<TileAddress>,
    onload: Option<Box<dyn FnOnce(Vec<Feature>) + Send>>,
}

/// Owns the tiles and features of one data layer.
///
/// All mutation APIs run synchronously to completion; only tile fetches and
/// commits touch the network, and their results enter the store exclusively
/// through [`pump`](Self::pump) and [`commit`](Self::commit). Between those
/// suspension points no partial state is observable.
pub struct Provider {
    config: ProviderConfig,
    tiles: HashMap<TileAddress, Tile>,
    features: HashMap<FeatureId, FeatureRecord>,
    /// Committed features removed locally, owed to the next change set.
    removed_remote: Vec<FeatureId>,
    next_local_id: u64,
    /// Generation counter; bumped by `clear()`. Resolved fetches carrying an
    /// older epoch are discarded.
    epoch: u64,
    history: Arc<Mutex<HistoryManager>>,
    events_tx: mpsc::UnboundedSender<StoreEvent>,
    remote: Option<RemoteSync>,
    loads_rx: Option<mpsc::UnboundedReceiver<TileLoad>>,
    pending: Vec<PendingQuery>,
}

impl Provider {
    /// Creates a local-only provider (no remote service attached).
    ///
    /// Returns the provider and the receiving end of its event channel.
    pub fn new(
        config: ProviderConfig,
        history: Arc<Mutex<HistoryManager>>,
    ) -> (Self, mpsc::UnboundedReceiver<StoreEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                tiles: HashMap::new(),
                features: HashMap::new(),
                removed_remote: Vec::new(),
                next_local_id: 1,
                epoch: 0,
                history,
                events_tx,
                remote: None,
                loads_rx: None,
                pending: Vec::new(),
            },
            events_rx,
        )
    }

    /// Attaches a remote service for tile fetches and commits.
    pub fn with_remote(mut self, service: Arc<dyn TileService>, retry: RetryPolicy) -> Self {
        let (remote, loads_rx) = RemoteSync::new(service, retry);
        self.remote = Some(remote);
        self.loads_rx = Some(loads_rx);
        self
    }

    /// Provider id.
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Current generation counter.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of live features.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Number of materialized tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Shared history handle.
    pub fn history(&self) -> Arc<Mutex<HistoryManager>> {
        Arc::clone(&self.history)
    }

    /// Sync state of a feature, if present.
    pub fn sync_state(&self, id: &FeatureId) -> Option<SyncState> {
        self.features.get(id).map(|r| r.sync)
    }

    /// Returns true if the feature has uncommitted local changes.
    pub fn is_dirty(&self, id: &FeatureId) -> bool {
        matches!(
            self.sync_state(id),
            Some(SyncState::Modified | SyncState::Committing)
        )
    }

    /// Tiles a feature is indexed under (primary first).
    pub fn tiles_of(&self, id: &FeatureId) -> Option<&[TileAddress]> {
        self.features.get(id).map(|r| r.tiles.as_slice())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a feature to the store.
    ///
    /// Assigns a provisional id when the feature carries none. Invalid
    /// geometry makes the call a silent no-op (`None`); the caller observes
    /// the absence of the `FeatureAdd` event rather than an error. Adding an
    /// id that already exists is treated as a modification of that feature.
    pub fn add_feature(&mut self, mut feature: Feature, style: Option<StyleMap>) -> Option<FeatureId> {
        if !feature.geometry.is_valid() {
            warn!(provider = %self.config.id, "rejected feature with invalid geometry");
            return None;
        }
        if let Some(style) = style {
            feature.style = Some(style);
        }

        if let Some(id) = feature.id.clone() {
            if self.features.contains_key(&id) {
                let applied = self.modify_feature(&id, |existing| {
                    existing.geometry = feature.geometry.clone();
                    existing.properties = feature.properties.clone();
                    existing.style = feature.style.clone();
                });
                return applied.then_some(id);
            }
        }

        let id = feature.id.clone().unwrap_or_else(|| {
            let id = FeatureId::Local(self.next_local_id);
            self.next_local_id += 1;
            id
        });
        feature.id = Some(id.clone());
        // Re-adding a previously removed committed id makes it live again;
        // drop any deletion still queued for it.
        self.removed_remote.retain(|queued| queued != &id);

        let tiles = self.index_feature(&feature);
        debug!(provider = %self.config.id, %id, tiles = tiles.len(), "feature added");
        self.features.insert(
            id.clone(),
            FeatureRecord {
                feature: feature.clone(),
                sync: SyncState::Modified,
                tiles,
            },
        );

        self.record_op(EditKind::Add {
            id: id.clone(),
            feature,
        });
        let _ = self.events_tx.send(StoreEvent::FeatureAdd(id.clone()));
        Some(id)
    }

    /// Adds several features; returns the assigned ids of those accepted.
    pub fn add_features(&mut self, features: Vec<Feature>) -> Vec<FeatureId> {
        features
            .into_iter()
            .filter_map(|f| self.add_feature(f, None))
            .collect()
    }

    /// Removes a feature. Silent no-op when the id is not present.
    pub fn remove_feature(&mut self, id: &FeatureId) -> bool {
        let Some(record) = self.features.remove(id) else {
            debug!(provider = %self.config.id, %id, "remove of unknown feature ignored");
            return false;
        };
        for address in &record.tiles {
            if let Some(tile) = self.tiles.get_mut(address) {
                tile.index.remove(id);
            }
        }
        if !id.is_provisional() {
            self.removed_remote.push(id.clone());
        }

        self.record_op(EditKind::Remove {
            id: id.clone(),
            feature: record.feature,
        });
        let _ = self.events_tx.send(StoreEvent::FeatureRemove(id.clone()));
        true
    }

    /// Applies an in-place edit to a feature's geometry or properties.
    ///
    /// Re-indexes across tiles, marks the feature dirty, and records a
    /// `Modify` operation with before/after snapshots. Returns false (and
    /// leaves the feature untouched) when the id is unknown or the edit
    /// produces invalid geometry.
    pub fn modify_feature(&mut self, id: &FeatureId, edit: impl FnOnce(&mut Feature)) -> bool {
        let Some(record) = self.features.get(id) else {
            return false;
        };
        let before = record.feature.clone();

        let mut after = before.clone();
        edit(&mut after);
        after.id = Some(id.clone());
        if !after.geometry.is_valid() {
            warn!(provider = %self.config.id, %id, "modification rejected: invalid geometry");
            return false;
        }

        self.reindex_feature(id, &after);
        let record = self
            .features
            .get_mut(id)
            .unwrap_or_else(|| unreachable!("checked above"));
        record.feature = after.clone();
        record.sync = SyncState::Modified;

        self.record_op(EditKind::Modify {
            id: id.clone(),
            before,
            after,
        });
        true
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Runs a query against locally cached data.
    ///
    /// Id lookups that miss return `None` slots; spatial queries return
    /// each matching feature exactly once, ghost references deduplicated.
    pub fn search(&self, query: &Query) -> QueryResult {
        match query {
            Query::Id(id) => QueryResult::One(self.features.get(id).map(|r| r.feature.clone())),
            Query::Ids(ids) => QueryResult::Many(
                ids.iter()
                    .map(|id| self.features.get(id).map(|r| r.feature.clone()))
                    .collect(),
            ),
            Query::Rect(rect) => QueryResult::Features(self.query_rect(rect)),
            Query::Radius { center, radius_m } => {
                assert!(*radius_m >= 0.0, "negative search radius");
                let area = expand_by_meters(&Rect::from_point(*center), *radius_m);
                let features = self
                    .candidates(&area)
                    .into_iter()
                    .filter(|f| f.geometry.distance_to(*center) <= *radius_m)
                    .collect();
                QueryResult::Features(features)
            }
        }
    }

    /// Features whose bounding box intersects `rect`, deduplicated.
    fn query_rect(&self, rect: &Rect) -> Vec<Feature> {
        self.candidates(rect)
            .into_iter()
            .filter(|f| f.geometry.bbox().intersects(rect))
            .collect()
    }

    /// Candidate features from every tile covering `rect`, each id once.
    fn candidates(&self, rect: &Rect) -> Vec<Feature> {
        let Ok(addresses) = coord::covering(self.config.indexing_zoom, rect) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for address in addresses {
            let Some(tile) = self.tiles.get(&address) else {
                continue;
            };
            for id in tile.index.query_rect(rect) {
                if seen.insert(id.clone()) {
                    if let Some(record) = self.features.get(&id) {
                        result.push(record.feature.clone());
                    }
                }
            }
        }
        result
    }

    /// Runs a spatial query, fetching not-yet-loaded tiles from the remote
    /// service first.
    ///
    /// `onload` fires exactly once with the final result: immediately when
    /// every covering tile is already full (or no remote is attached),
    /// otherwise after the missing tiles resolve through [`pump`](Self::pump).
    /// Results for a provider cleared in the meantime are discarded.
    pub fn search_remote(
        &mut self,
        query: Query,
        onload: Box<dyn FnOnce(Vec<Feature>) + Send>,
    ) {
        let area = match &query {
            Query::Rect(rect) => *rect,
            Query::Radius { center, radius_m } => {
                assert!(*radius_m >= 0.0, "negative search radius");
                expand_by_meters(&Rect::from_point(*center), *radius_m)
            }
            // Id lookups have no tile extent; they answer from local state.
            _ => {
                onload(self.search(&query).features());
                return;
            }
        };

        let addresses = coord::covering(self.config.indexing_zoom, &area).unwrap_or_default();
        let mut remaining = HashSet::new();
        if self.remote.is_some() {
            for address in addresses {
                let status = self
                    .tiles
                    .get(&address)
                    .map(|t| t.status())
                    .unwrap_or(TileStatus::Empty);
                if matches!(status, TileStatus::Full) {
                    continue;
                }
                let tile = self.tile_mut(address);
                tile.set_status(TileStatus::Loading);
                if let Some(remote) = &self.remote {
                    remote.request_tile(address, self.epoch);
                }
                remaining.insert(address);
            }
        }

        if remaining.is_empty() {
            onload(self.search(&query).features());
            return;
        }

        debug!(provider = %self.config.id, tiles = remaining.len(), "query parked on tile fetches");
        self.pending.push(PendingQuery {
            query,
            remaining,
            onload: Some(onload),
        });
    }

    // =========================================================================
    // Remote integration
    // =========================================================================

    /// Drains resolved tile fetches into the store and completes parked
    /// queries whose tiles are all resolved. Returns the number of tile
    /// loads applied.
    ///
    /// The host loop calls this between frames; nothing else applies
    /// asynchronous results, so store state never changes mid-mutation.
    pub fn pump(&mut self) -> usize {
        let mut loads = Vec::new();
        if let Some(rx) = self.loads_rx.as_mut() {
            while let Ok(load) = rx.try_recv() {
                loads.push(load);
            }
        }
        let applied = loads.len();
        for load in loads {
            self.integrate_load(load);
        }
        applied
    }

    fn integrate_load(&mut self, load: TileLoad) {
        if load.epoch != self.epoch {
            debug!(
                provider = %self.config.id,
                address = %load.address,
                stale = load.epoch,
                current = self.epoch,
                "discarding stale tile load"
            );
            return;
        }

        match load.result {
            Ok(features) => {
                let count = features.len();
                for feature in features {
                    self.insert_remote_feature(feature);
                }
                self.tile_mut(load.address).set_status(TileStatus::Full);
                debug!(provider = %self.config.id, address = %load.address, count, "tile loaded");
            }
            Err(err) => {
                self.tile_mut(load.address).set_status(TileStatus::Stale);
                warn!(provider = %self.config.id, address = %load.address, %err, "tile load failed");
            }
        }

        // Complete parked queries whose tiles have all resolved.
        let mut completed = Vec::new();
        for pending in &mut self.pending {
            pending.remaining.remove(&load.address);
            if pending.remaining.is_empty() {
                completed.push((pending.query.clone(), pending.onload.take()));
            }
        }
        self.pending.retain(|p| !p.remaining.is_empty());
        for (query, onload) in completed {
            if let Some(onload) = onload {
                onload(self.search(&query).features());
            }
        }
    }

    /// Inserts a fetched feature. Local state wins: an id already present
    /// locally (possibly edited) is never overwritten by remote data.
    fn insert_remote_feature(&mut self, feature: Feature) {
        let Some(id) = feature.id.clone() else {
            warn!(provider = %self.config.id, "remote feature without id skipped");
            return;
        };
        if self.features.contains_key(&id) {
            return;
        }
        let tiles = self.index_feature(&feature);
        self.features.insert(
            id.clone(),
            FeatureRecord {
                feature,
                sync: SyncState::Clean,
                tiles,
            },
        );
        let _ = self.events_tx.send(StoreEvent::FeatureAdd(id));
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// The diff accumulated since the last successful commit.
    pub fn pending_changes(&self) -> ChangeSet {
        let put = self
            .features
            .values()
            .filter(|r| matches!(r.sync, SyncState::Modified | SyncState::Committing))
            .map(|r| r.feature.clone())
            .collect();
        debug_assert!(
            self.removed_remote.iter().all(|id| !self.features.contains_key(id)),
            "a queued removal must not reference a live feature"
        );
        ChangeSet {
            put,
            remove: self.removed_remote.clone(),
        }
    }

    /// Forgets all pending-commit bookkeeping: every feature is marked
    /// clean and queued removals are dropped. Used when the session is
    /// reverted to the last committed state.
    pub(crate) fn reset_pending(&mut self) {
        for record in self.features.values_mut() {
            record.sync = SyncState::Clean;
        }
        self.removed_remote.clear();
    }

    /// Commits pending changes to the remote service.
    ///
    /// Atomic from the caller's perspective: on success every committed
    /// feature is clean and provisional ids are re-keyed through the
    /// returned id map; on failure every feature stays dirty and the change
    /// set remains pending for retry.
    pub async fn commit(&mut self) -> Result<IdMap, RemoteError> {
        let changeset = self.pending_changes();
        if changeset.is_empty() {
            return Ok(IdMap::new());
        }
        if self.remote.is_none() {
            return Err(RemoteError::permanent("no remote service attached"));
        }

        for feature in &changeset.put {
            if let Some(id) = &feature.id {
                if let Some(record) = self.features.get_mut(id) {
                    record.sync = SyncState::Committing;
                }
            }
        }

        // Borrow note: RemoteSync::commit only touches the service, not the
        // store, so moving it out for the await keeps the borrows disjoint.
        let remote = self.remote.take().unwrap_or_else(|| unreachable!("checked above"));
        let result = remote.commit(&self.config.id, &changeset).await;
        self.remote = Some(remote);

        match result {
            Ok(id_map) => {
                self.apply_commit(&id_map);
                info!(
                    provider = %self.config.id,
                    put = changeset.put.len(),
                    removed = changeset.remove.len(),
                    "commit succeeded"
                );
                Ok(id_map)
            }
            Err(err) => {
                self.fail_commit();
                warn!(provider = %self.config.id, %err, "commit failed, changes stay pending");
                Err(err)
            }
        }
    }

    fn apply_commit(&mut self, id_map: &IdMap) {
        // Recorded history steps follow the rename; an undo reaching past
        // this commit then addresses the live feature under its new id.
        self.history.lock().rekey(&self.config.id, id_map);
        for (old, new) in id_map {
            let Some(mut record) = self.features.remove(old) else {
                continue;
            };
            record.feature.id = Some(new.clone());
            let bbox = record.feature.geometry.bbox();
            // Geometry is unchanged; only the index key moves.
            for address in record.tiles.clone() {
                if let Some(tile) = self.tiles.get_mut(&address) {
                    let ghost = tile.index.is_ghost(old);
                    tile.index.remove(old);
                    tile.index.insert(new.clone(), bbox, ghost);
                }
            }
            self.features.insert(new.clone(), record);
        }
        for record in self.features.values_mut() {
            if record.sync == SyncState::Committing {
                record.sync = SyncState::Clean;
            }
        }
        self.removed_remote.clear();
    }

    fn fail_commit(&mut self) {
        for record in self.features.values_mut() {
            if record.sync == SyncState::Committing {
                record.sync = SyncState::Modified;
            }
        }
    }

    // =========================================================================
    // Tiles
    // =========================================================================

    /// The tile at an address, if it has been materialized.
    pub fn get_cached_tile(&self, address: &TileAddress) -> Option<&Tile> {
        self.tiles.get(address)
    }

    /// Evicts all tiles and features and bumps the epoch.
    ///
    /// In-flight fetches are not cancelled; their results resolve into the
    /// new epoch, fail the comparison, and are dropped. Parked queries are
    /// discarded with them.
    pub fn clear(&mut self) {
        info!(provider = %self.config.id, features = self.features.len(), "store cleared");
        self.tiles.clear();
        self.features.clear();
        self.removed_remote.clear();
        self.pending.clear();
        self.epoch += 1;
    }

    fn tile_mut(&mut self, address: TileAddress) -> &mut Tile {
        self.tiles
            .entry(address)
            .or_insert_with(|| Tile::new(address))
    }

    // =========================================================================
    // Indexing
    // =========================================================================

    /// Indexes a feature into its primary tile and margin-overlapping
    /// neighbors, returning the membership list (primary first).
    fn index_feature(&mut self, feature: &Feature) -> Vec<TileAddress> {
        let bbox = feature.geometry.bbox();
        let Some(assignment) = plan_assignment(
            self.config.indexing_zoom,
            self.config.margin_m,
            feature,
        ) else {
            warn!(provider = %self.config.id, "feature outside the indexable grid");
            return Vec::new();
        };

        let Some(id) = feature.id.clone() else {
            return Vec::new();
        };
        for (address, ghost) in &assignment {
            let tile = self.tile_mut(*address);
            if tile.status() == TileStatus::Empty {
                tile.set_status(TileStatus::Partial);
            }
            tile.index.insert(id.clone(), bbox, *ghost);
        }
        assignment.into_iter().map(|(address, _)| address).collect()
    }

    /// Moves a feature's index entries to match new geometry.
    fn reindex_feature(&mut self, id: &FeatureId, after: &Feature) {
        if let Some(record) = self.features.get(id) {
            let old_tiles = record.tiles.clone();
            for address in old_tiles {
                if let Some(tile) = self.tiles.get_mut(&address) {
                    tile.index.remove(id);
                }
            }
        }
        let tiles = self.index_feature(after);
        if let Some(record) = self.features.get_mut(id) {
            record.tiles = tiles;
        }
    }

    /// Applies a precomputed re-assignment of every feature to tiles,
    /// produced by a background [`ReindexTask`](super::ReindexTask) after a
    /// margin or zoom change.
    pub fn apply_reindex(
        &mut self,
        margin_m: f64,
        assignments: Vec<(FeatureId, Vec<(TileAddress, bool)>)>,
    ) {
        self.config.margin_m = margin_m;
        for tile in self.tiles.values_mut() {
            tile.index = Default::default();
        }
        for (id, assignment) in assignments {
            let Some(record) = self.features.get(&id) else {
                continue;
            };
            let bbox = record.feature.geometry.bbox();
            let tiles: Vec<TileAddress> =
                assignment.iter().map(|(address, _)| *address).collect();
            for (address, ghost) in assignment {
                let tile = self.tile_mut(address);
                if tile.status() == TileStatus::Empty {
                    tile.set_status(TileStatus::Partial);
                }
                tile.index.insert(id.clone(), bbox, ghost);
            }
            if let Some(record) = self.features.get_mut(&id) {
                record.tiles = tiles;
            }
        }
        info!(provider = %self.config.id, margin_m, "re-index applied");
    }

    /// Snapshot of all features, used to plan a background re-index.
    pub fn feature_snapshots(&self) -> Vec<Feature> {
        self.features.values().map(|r| r.feature.clone()).collect()
    }

    /// Indexing zoom of this provider.
    pub fn indexing_zoom(&self) -> u8 {
        self.config.indexing_zoom
    }

    // =========================================================================
    // History plumbing
    // =========================================================================

    fn record_op(&self, kind: EditKind) {
        self.history.lock().record(EditOp {
            provider: self.config.id.clone(),
            kind,
        });
    }

    /// Re-inserts an exact feature snapshot without recording history.
    ///
    /// Used by the editor to revert `Remove` operations (and re-apply `Add`
    /// operations on redo). The feature is marked dirty again: restoring it
    /// diverges local state from the remote.
    pub(crate) fn restore_raw(&mut self, feature: Feature) {
        let Some(id) = feature.id.clone() else {
            return;
        };
        // A restored feature is live again; a queued remote deletion for it
        // would make the next change set both put and remove the same id.
        self.removed_remote.retain(|queued| queued != &id);
        let tiles = self.index_feature(&feature);
        self.features.insert(
            id.clone(),
            FeatureRecord {
                feature,
                sync: SyncState::Modified,
                tiles,
            },
        );
        let _ = self.events_tx.send(StoreEvent::FeatureAdd(id));
    }

    /// Removes a feature without recording history. Silent when absent.
    pub(crate) fn remove_raw(&mut self, id: &FeatureId) {
        let Some(record) = self.features.remove(id) else {
            return;
        };
        for address in &record.tiles {
            if let Some(tile) = self.tiles.get_mut(address) {
                tile.index.remove(id);
            }
        }
        // Same bookkeeping as a recorded remove: deleting a committed
        // feature locally must delete it remotely on the next commit.
        if !id.is_provisional() {
            self.removed_remote.push(id.clone());
        }
        let _ = self.events_tx.send(StoreEvent::FeatureRemove(id.clone()));
    }

    /// Replaces a feature with an exact snapshot without recording history.
    pub(crate) fn replace_raw(&mut self, snapshot: Feature) {
        let Some(id) = snapshot.id.clone() else {
            return;
        };
        if !self.features.contains_key(&id) {
            self.restore_raw(snapshot);
            return;
        }
        self.reindex_feature(&id, &snapshot);
        if let Some(record) = self.features.get_mut(&id) {
            record.feature = snapshot;
            record.sync = SyncState::Modified;
        }
    }
}

/// Plans tile membership for a feature: the primary tile owning its
/// canonical coordinate plus, as ghosts, every other tile whose bounds the
/// margin-expanded bounding box reaches.
pub(crate) fn plan_assignment(
    zoom: u8,
    margin_m: f64,
    feature: &Feature,
) -> Option<Vec<(TileAddress, bool)>> {
    let anchor = feature.geometry.primary_coordinate()?;
    // Geometry validation allows the full ±90 range; clamp into the
    // Web Mercator band the grid can address.
    let anchor = LonLat::new(
        anchor.lon.clamp(-180.0, 180.0),
        anchor.lat.clamp(MIN_LAT, MAX_LAT),
    );
    let primary = coord::tile_of(zoom, anchor).ok()?;

    let expanded = expand_by_meters(&feature.geometry.bbox(), margin_m);
    let mut assignment = vec![(primary, false)];
    if let Ok(addresses) = coord::covering(zoom, &expanded) {
        for address in addresses {
            if address != primary {
                assignment.push((address, true));
            }
        }
    }
    Some(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Geometry;

    fn provider() -> (Provider, mpsc::UnboundedReceiver<StoreEvent>) {
        let history = Arc::new(Mutex::new(HistoryManager::new()));
        Provider::new(ProviderConfig::new("test-layer"), history)
    }

    fn point(lon: f64, lat: f64) -> Feature {
        Feature::new(Geometry::Point(LonLat::new(lon, lat)))
    }

    #[test]
    fn test_add_assigns_provisional_ids() {
        let (mut store, _events) = provider();
        let a = store.add_feature(point(13.4, 52.5), None).unwrap();
        let b = store.add_feature(point(13.5, 52.5), None).unwrap();
        assert!(a.is_provisional());
        assert_ne!(a, b, "ids unique within the provider");
        assert_eq!(store.feature_count(), 2);
        assert!(store.is_dirty(&a));
    }

    #[test]
    fn test_add_invalid_geometry_is_silent_noop() {
        let (mut store, mut events) = provider();
        let bad = Feature::new(Geometry::LineString(vec![LonLat::new(0.0, 0.0)]));
        assert!(store.add_feature(bad, None).is_none());
        assert_eq!(store.feature_count(), 0);
        assert!(events.try_recv().is_err(), "no FeatureAdd event");
    }

    #[test]
    fn test_add_existing_id_modifies() {
        let (mut store, _events) = provider();
        let id = FeatureId::Remote("poi-1".into());
        store.add_feature(
            Feature::with_id(id.clone(), Geometry::Point(LonLat::new(1.0, 1.0))),
            None,
        );
        store.add_feature(
            Feature::with_id(id.clone(), Geometry::Point(LonLat::new(2.0, 2.0))),
            None,
        );
        assert_eq!(store.feature_count(), 1);
        let found = match store.search(&Query::Id(id)) {
            QueryResult::One(found) => found.unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(found.geometry, Geometry::Point(LonLat::new(2.0, 2.0)));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (mut store, _events) = provider();
        assert!(!store.remove_feature(&FeatureId::Local(99)));
    }

    #[test]
    fn test_remove_committed_feature_queued_for_remote() {
        let (mut store, _events) = provider();
        let id = FeatureId::Remote("road-1".into());
        store.add_feature(
            Feature::with_id(id.clone(), Geometry::Point(LonLat::new(1.0, 1.0))),
            None,
        );
        store.remove_feature(&id);
        let changes = store.pending_changes();
        assert_eq!(changes.remove, vec![id]);
    }

    #[test]
    fn test_search_by_ids_preserves_slots() {
        let (mut store, _events) = provider();
        let id = store.add_feature(point(1.0, 1.0), None).unwrap();
        let result = store.search(&Query::Ids(vec![
            FeatureId::from("-1"),
            id.clone(),
            FeatureId::from("-2"),
        ]));
        let QueryResult::Many(slots) = result else {
            unreachable!()
        };
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_none());
        assert_eq!(slots[1].as_ref().unwrap().id, Some(id));
        assert!(slots[2].is_none());
    }

    #[test]
    fn test_radius_search() {
        let (mut store, _events) = provider();
        let center = LonLat::new(13.4, 52.5);
        // ~55 m east and ~150 m east of center at this latitude.
        store.add_feature(point(13.4008, 52.5), None).unwrap();
        store.add_feature(point(13.4022, 52.5), None).unwrap();

        let near = store.search(&Query::radius(center, 100.0));
        assert_eq!(near.count(), 1);
        let wide = store.search(&Query::radius(center, 300.0));
        assert_eq!(wide.count(), 2);
    }

    #[test]
    fn test_margin_ghost_dedup() {
        let (mut store, _events) = provider();
        // A point right next to a tile boundary gets ghost-indexed in the
        // neighboring tile.
        let tile = coord::tile_address(DEFAULT_INDEXING_ZOOM, 13.4, 52.5).unwrap();
        let bounds = coord::bounds(&tile);
        let near_edge = LonLat::new(bounds.max_lon - 1e-7, 52.5);
        let id = store
            .add_feature(Feature::new(Geometry::Point(near_edge)), None)
            .unwrap();

        let tiles = store.tiles_of(&id).unwrap();
        assert!(tiles.len() >= 2, "indexed in primary and ghost tiles");

        // A rect spanning the boundary returns the feature exactly once.
        let spanning = Rect::new(
            bounds.max_lon - 0.01,
            52.49,
            bounds.max_lon + 0.01,
            52.51,
        );
        let result = store.search(&Query::Rect(spanning));
        assert_eq!(result.count(), 1);
    }

    #[test]
    fn test_modify_reindexes_and_dirties() {
        let (mut store, _events) = provider();
        let id = FeatureId::Remote("poi-1".into());
        store.add_feature(
            Feature::with_id(id.clone(), Geometry::Point(LonLat::new(13.4, 52.5))),
            None,
        );
        let before_tiles = store.tiles_of(&id).unwrap().to_vec();

        assert!(store.modify_feature(&id, |f| {
            f.geometry = Geometry::Point(LonLat::new(9.0, 48.0));
        }));
        let after_tiles = store.tiles_of(&id).unwrap().to_vec();
        assert_ne!(before_tiles, after_tiles);
        assert!(store.is_dirty(&id));

        // The old location no longer finds it.
        let old = store.search(&Query::radius(LonLat::new(13.4, 52.5), 50.0));
        assert_eq!(old.count(), 0);
        let new = store.search(&Query::radius(LonLat::new(9.0, 48.0), 50.0));
        assert_eq!(new.count(), 1);
    }

    #[test]
    fn test_modify_invalid_geometry_rejected() {
        let (mut store, _events) = provider();
        let id = store.add_feature(point(1.0, 1.0), None).unwrap();
        assert!(!store.modify_feature(&id, |f| {
            f.geometry = Geometry::Point(LonLat::new(f64::NAN, 0.0));
        }));
        // Untouched.
        let found = store.search(&Query::Id(id)).features();
        assert_eq!(found[0].geometry, Geometry::Point(LonLat::new(1.0, 1.0)));
    }

    #[test]
    fn test_clear_bumps_epoch_and_evicts() {
        let (mut store, _events) = provider();
        store.add_feature(point(1.0, 1.0), None);
        assert_eq!(store.epoch(), 0);
        store.clear();
        assert_eq!(store.epoch(), 1);
        assert_eq!(store.feature_count(), 0);
        assert_eq!(store.tile_count(), 0);
    }

    #[test]
    fn test_get_cached_tile() {
        let (mut store, _events) = provider();
        let id = store.add_feature(point(13.4, 52.5), None).unwrap();
        let address = store.tiles_of(&id).unwrap()[0];
        let tile = store.get_cached_tile(&address).unwrap();
        assert_eq!(tile.status(), TileStatus::Partial);
        assert!(store
            .get_cached_tile(&TileAddress::new(0, 0, 1).unwrap())
            .is_none());
    }

    #[test]
    fn test_events_emitted() {
        let (mut store, mut events) = provider();
        let id = store.add_feature(point(1.0, 1.0), None).unwrap();
        assert_eq!(events.try_recv().unwrap(), StoreEvent::FeatureAdd(id.clone()));
        store.remove_feature(&id);
        assert_eq!(events.try_recv().unwrap(), StoreEvent::FeatureRemove(id));
    }

    #[test]
    fn test_plan_assignment_interior_point_single_tile() {
        let feature = point(13.4, 52.5);
        let mut feature = feature;
        feature.id = Some(FeatureId::Local(1));
        // Center of a tile: margin does not reach any boundary.
        let center = coord::bounds(
            &coord::tile_address(DEFAULT_INDEXING_ZOOM, 13.4, 52.5).unwrap(),
        )
        .center();
        feature.geometry = Geometry::Point(center);
        let assignment =
            plan_assignment(DEFAULT_INDEXING_ZOOM, DEFAULT_MARGIN_M, &feature).unwrap();
        assert_eq!(assignment.len(), 1);
        assert!(!assignment[0].1, "primary is not a ghost");
    }

    mod remote_flow {
        use super::*;
        use crate::remote::{MockTileService, RetryPolicy};
        use std::time::Duration;

        fn remote_provider(
            service: Arc<MockTileService>,
        ) -> (Provider, mpsc::UnboundedReceiver<StoreEvent>) {
            let history = Arc::new(Mutex::new(HistoryManager::new()));
            let (store, events) = Provider::new(ProviderConfig::new("test-layer"), history);
            (store.with_remote(service, RetryPolicy::None), events)
        }

        /// Pumps until `store` has applied `n` loads or the deadline passes.
        async fn pump_until(store: &mut Provider, n: usize) {
            let mut applied = 0;
            for _ in 0..100 {
                applied += store.pump();
                if applied >= n {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            panic!("expected {n} loads, saw {applied}");
        }

        #[tokio::test]
        async fn test_search_remote_fetches_then_answers() {
            let service = MockTileService::new();
            let center = LonLat::new(13.4, 52.5);
            let address = coord::tile_address(DEFAULT_INDEXING_ZOOM, 13.4, 52.5).unwrap();
            service.put_tile(
                address,
                vec![Feature::with_id(
                    FeatureId::Remote("poi-1".into()),
                    Geometry::Point(center),
                )],
            );
            let (mut store, _events) = remote_provider(service.clone());

            let (tx, rx) = std::sync::mpsc::channel();
            store.search_remote(
                Query::radius(center, 100.0),
                Box::new(move |features| {
                    let _ = tx.send(features);
                }),
            );
            assert!(rx.try_recv().is_err(), "query parked until tiles resolve");

            pump_until(&mut store, 1).await;
            let results = rx.try_recv().unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].id, Some(FeatureId::Remote("poi-1".into())));
            assert_eq!(
                store.get_cached_tile(&address).unwrap().status(),
                TileStatus::Full
            );

            // Tile is full now: the same query answers without a new fetch.
            let fetches = service.fetch_count();
            let (tx, rx) = std::sync::mpsc::channel();
            store.search_remote(
                Query::radius(center, 100.0),
                Box::new(move |features| {
                    let _ = tx.send(features);
                }),
            );
            assert_eq!(rx.try_recv().unwrap().len(), 1);
            assert_eq!(service.fetch_count(), fetches);
        }

        #[tokio::test]
        async fn test_local_edit_wins_over_fetched_data() {
            let service = MockTileService::new();
            let center = LonLat::new(13.4, 52.5);
            let address = coord::tile_address(DEFAULT_INDEXING_ZOOM, 13.4, 52.5).unwrap();
            let id = FeatureId::Remote("poi-1".into());
            service.put_tile(
                address,
                vec![Feature::with_id(id.clone(), Geometry::Point(center))],
            );
            let (mut store, _events) = remote_provider(service);

            // Locally edited version of the same feature, present before the
            // fetch resolves.
            store.add_feature(
                Feature::with_id(id.clone(), Geometry::Point(center)).prop("name", "edited"),
                None,
            );
            let (tx, rx) = std::sync::mpsc::channel();
            store.search_remote(
                Query::radius(center, 100.0),
                Box::new(move |features| {
                    let _ = tx.send(features);
                }),
            );
            pump_until(&mut store, 1).await;

            let results = rx.try_recv().unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].properties["name"], "edited");
            assert!(store.is_dirty(&id));
        }

        #[tokio::test]
        async fn test_clear_discards_stale_loads() {
            let service = MockTileService::new();
            let center = LonLat::new(13.4, 52.5);
            let address = coord::tile_address(DEFAULT_INDEXING_ZOOM, 13.4, 52.5).unwrap();
            service.put_tile(
                address,
                vec![Feature::with_id(
                    FeatureId::Remote("poi-1".into()),
                    Geometry::Point(center),
                )],
            );
            let (mut store, _events) = remote_provider(service);

            store.search_remote(Query::radius(center, 100.0), Box::new(|_| {}));
            store.clear();

            // The flight resolves into the old epoch and is dropped.
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.pump();
            assert_eq!(store.feature_count(), 0);
            assert!(store.get_cached_tile(&address).is_none());
        }

        #[tokio::test]
        async fn test_commit_rekeys_provisional_ids() {
            let service = MockTileService::new();
            let (mut store, _events) = remote_provider(service);
            let local = store
                .add_feature(Feature::new(Geometry::Point(LonLat::new(1.0, 1.0))), None)
                .unwrap();
            assert!(local.is_provisional());

            let id_map = store.commit().await.unwrap();
            let remote = id_map.get(&local).unwrap().clone();
            assert!(!remote.is_provisional());

            // Old key gone, new key live and clean; the index follows.
            assert_eq!(store.sync_state(&local), None);
            assert_eq!(store.sync_state(&remote), Some(SyncState::Clean));
            let found = store.search(&Query::radius(LonLat::new(1.0, 1.0), 50.0));
            assert_eq!(found.features()[0].id, Some(remote));
            assert!(store.pending_changes().is_empty());
        }

        #[tokio::test]
        async fn test_failed_commit_keeps_changes_pending() {
            let service = MockTileService::new();
            service.fail_next_commit(RemoteError::transient("down"));
            let (mut store, _events) = remote_provider(service);
            let id = store
                .add_feature(Feature::new(Geometry::Point(LonLat::new(1.0, 1.0))), None)
                .unwrap();

            let err = store.commit().await.unwrap_err();
            assert!(err.is_transient());
            assert_eq!(store.sync_state(&id), Some(SyncState::Modified));
            assert_eq!(store.pending_changes().put.len(), 1);

            // A later commit picks the same change set up again.
            store.commit().await.unwrap();
            assert_eq!(store.sync_state(&id), None, "re-keyed on success");
            assert!(store.pending_changes().is_empty());
        }

        #[tokio::test]
        async fn test_commit_sends_queued_removals_once() {
            let service = MockTileService::new();
            let (mut store, _events) = remote_provider(service.clone());
            let id = FeatureId::Remote("road-1".into());
            store.add_feature(Feature::with_id(id.clone(), Geometry::Point(LonLat::new(1.0, 1.0))), None);
            store.remove_feature(&id);

            store.commit().await.unwrap();
            assert!(store.pending_changes().is_empty(), "removal delivered");
            store.commit().await.unwrap();
            // Second commit was empty and short-circuited.
            assert_eq!(service.commit_count(), 1);
        }
    }
}
