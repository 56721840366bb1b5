//! Tile service abstraction and HTTP implementation.
//!
//! The trait exists for dependency injection: tests run against an
//! in-memory mock, production against the reqwest-backed client.

use super::changeset::{ChangeSet, CommitResponse};
use super::error::RemoteError;
use crate::coord::TileAddress;
use crate::geom::{Feature, FeatureId};
use futures::future::BoxFuture;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Abstract remote feature service.
///
/// Methods return boxed futures so the trait stays object-safe and
/// implementations can be swapped behind an `Arc<dyn TileService>`.
pub trait TileService: Send + Sync + 'static {
    /// Fetches every feature of one tile.
    fn fetch_tile(
        &self,
        address: TileAddress,
    ) -> BoxFuture<'_, Result<Vec<Feature>, RemoteError>>;

    /// Commits a change set for one provider, returning the id map.
    fn commit(
        &self,
        provider_id: String,
        changeset: ChangeSet,
    ) -> BoxFuture<'_, Result<CommitResponse, RemoteError>>;
}

/// Default request timeout for the HTTP client.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP implementation of [`TileService`].
///
/// Endpoint layout follows the abstract contract:
/// `GET {base}/tile/{zoom}/{x}/{y}` and `POST {base}/batch/{provider}`.
pub struct HttpTileService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTileService {
    /// Creates a client for the given service base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RemoteError::permanent(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Maps an HTTP status onto the failure taxonomy.
    fn status_error(status: reqwest::StatusCode, context: &str) -> RemoteError {
        match status.as_u16() {
            409 => RemoteError::Conflict(format!("{context}: HTTP 409")),
            400 | 422 => RemoteError::Validation(format!("{context}: HTTP {status}")),
            500..=599 | 429 => RemoteError::transient(format!("{context}: HTTP {status}")),
            _ => RemoteError::permanent(format!("{context}: HTTP {status}")),
        }
    }

    fn transport_error(e: reqwest::Error, context: &str) -> RemoteError {
        // Timeouts and connection drops are worth retrying.
        if e.is_timeout() || e.is_connect() || e.is_request() {
            RemoteError::transient(format!("{context}: {e}"))
        } else {
            RemoteError::permanent(format!("{context}: {e}"))
        }
    }
}

/// Commit response as it appears on the wire. JSON object keys are strings;
/// provisional ids come back as their decimal form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCommitResponse {
    #[serde(default)]
    id_map: HashMap<String, String>,
    #[serde(default)]
    errors: Vec<String>,
}

impl From<WireCommitResponse> for CommitResponse {
    fn from(wire: WireCommitResponse) -> Self {
        let id_map = wire
            .id_map
            .into_iter()
            .map(|(k, v)| {
                let local = match k.parse::<u64>() {
                    Ok(n) => FeatureId::Local(n),
                    Err(_) => FeatureId::Remote(k),
                };
                (local, FeatureId::Remote(v))
            })
            .collect();
        Self {
            id_map,
            errors: wire.errors,
        }
    }
}

impl TileService for HttpTileService {
    fn fetch_tile(
        &self,
        address: TileAddress,
    ) -> BoxFuture<'_, Result<Vec<Feature>, RemoteError>> {
        Box::pin(async move {
            let url = format!(
                "{}/tile/{}/{}/{}",
                self.base_url, address.zoom, address.x, address.y
            );
            debug!(%address, %url, "fetching tile");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| Self::transport_error(e, "tile fetch"))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Self::status_error(status, "tile fetch"));
            }

            response
                .json::<Vec<Feature>>()
                .await
                .map_err(|e| RemoteError::permanent(format!("tile payload decode: {e}")))
        })
    }

    fn commit(
        &self,
        provider_id: String,
        changeset: ChangeSet,
    ) -> BoxFuture<'_, Result<CommitResponse, RemoteError>> {
        Box::pin(async move {
            let url = format!("{}/batch/{}", self.base_url, provider_id);
            debug!(
                provider = %provider_id,
                put = changeset.put.len(),
                remove = changeset.remove.len(),
                "committing change set"
            );

            let response = self
                .client
                .post(&url)
                .json(&changeset)
                .send()
                .await
                .map_err(|e| Self::transport_error(e, "commit"))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Self::status_error(status, "commit"));
            }

            let wire = response
                .json::<WireCommitResponse>()
                .await
                .map_err(|e| RemoteError::permanent(format!("commit response decode: {e}")))?;
            Ok(wire.into())
        })
    }
}
