//! Fetch coalescing and commit driving.

use super::changeset::{ChangeSet, IdMap};
use super::error::RemoteError;
use super::retry::RetryPolicy;
use super::service::TileService;
use crate::coord::TileAddress;
use crate::geom::Feature;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A resolved tile fetch, delivered on the load channel.
///
/// Carries the provider epoch current when the fetch was issued; the
/// consumer compares it against the provider's live epoch and discards
/// stale loads. That comparison is the cancellation mechanism; there is no
/// true cancel on an in-flight network request.
#[derive(Debug)]
pub struct TileLoad {
    /// Tile the payload belongs to.
    pub address: TileAddress,
    /// Provider epoch at request time.
    pub epoch: u64,
    /// Fetched features, or the failure.
    pub result: Result<Vec<Feature>, RemoteError>,
}

/// Asynchronous bridge between a provider and its [`TileService`].
///
/// Owns the in-flight request table: a second request for a tile already
/// being fetched attaches to the running flight instead of issuing another
/// network call. Results come back as [`TileLoad`] events on the channel
/// handed out at construction.
pub struct RemoteSync {
    service: Arc<dyn TileService>,
    inflight: Arc<DashMap<TileAddress, u64>>,
    loads_tx: mpsc::UnboundedSender<TileLoad>,
    retry: RetryPolicy,
}

impl RemoteSync {
    /// Creates a sync layer over a service.
    ///
    /// Returns the sync handle and the receiving end of the tile-load
    /// channel; the editor pump drains the receiver.
    pub fn new(
        service: Arc<dyn TileService>,
        retry: RetryPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<TileLoad>) {
        let (loads_tx, loads_rx) = mpsc::unbounded_channel();
        (
            Self {
                service,
                inflight: Arc::new(DashMap::new()),
                loads_tx,
                retry,
            },
            loads_rx,
        )
    }

    /// Requests a tile fetch for the given provider epoch.
    ///
    /// Returns false when the request coalesced onto an already running
    /// fetch for the same address and a current-or-newer epoch. A flight
    /// issued before a `clear()` (older epoch) does not satisfy the new
    /// epoch; in that case a fresh fetch is issued and the stale flight's
    /// result will be dropped by the epoch check downstream.
    pub fn request_tile(&self, address: TileAddress, epoch: u64) -> bool {
        {
            let mut issue = false;
            let mut entry = self.inflight.entry(address).or_insert_with(|| {
                issue = true;
                epoch
            });
            if !issue {
                if *entry >= epoch {
                    debug!(%address, "coalesced onto in-flight fetch");
                    return false;
                }
                // In-flight fetch is from a superseded epoch; re-issue.
                *entry = epoch;
            }
        }

        let service = Arc::clone(&self.service);
        let inflight = Arc::clone(&self.inflight);
        let loads_tx = self.loads_tx.clone();
        tokio::spawn(async move {
            let result = service.fetch_tile(address).await;
            if let Err(ref err) = result {
                warn!(%address, %err, "tile fetch failed");
            }
            // A superseding flight may have re-claimed the entry with a
            // newer epoch; only the owning flight unregisters it.
            inflight.remove_if(&address, |_, current| *current == epoch);
            // Receiver gone means the provider was dropped; nothing to do.
            let _ = loads_tx.send(TileLoad {
                address,
                epoch,
                result,
            });
        });
        true
    }

    /// Number of fetches currently in flight.
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    /// Commits a change set, retrying transient failures per the policy.
    ///
    /// Conflict and validation failures are returned on the first
    /// occurrence. The change set itself is never mutated here; on failure
    /// the caller keeps it pending and may retry the whole commit.
    pub async fn commit(
        &self,
        provider_id: &str,
        changeset: &ChangeSet,
    ) -> Result<IdMap, RemoteError> {
        let mut attempt = 1u32;
        loop {
            match self
                .service
                .commit(provider_id.to_string(), changeset.clone())
                .await
            {
                Ok(response) => {
                    if !response.errors.is_empty() {
                        warn!(
                            provider = provider_id,
                            errors = response.errors.len(),
                            "commit reported soft errors"
                        );
                    }
                    return Ok(response.id_map);
                }
                Err(err) if err.is_transient() => {
                    let Some(delay) = self.retry.delay_for_attempt(attempt) else {
                        warn!(provider = provider_id, %err, attempt, "commit retries exhausted");
                        return Err(err);
                    };
                    debug!(provider = provider_id, %err, attempt, ?delay, "retrying commit");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
