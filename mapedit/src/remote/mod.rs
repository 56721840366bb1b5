//! Remote synchronization.
//!
//! Talks to the networked feature service: fetches tile payloads on demand
//! and commits local change sets back. The wire format belongs to the remote
//! service; this module only assumes the abstract contract of
//! `GET tile(z,x,y)` and `POST batch(provider, {put, remove})`.
//!
//! # Architecture
//!
//! ```text
//! Provider ──request_tile──► RemoteSync ──► TileService (HTTP / mock)
//!     ▲                          │
//!     └──── TileLoad events ◄────┘   (epoch-tagged, drained by the editor pump)
//! ```
//!
//! Concurrent requests for the same tile are coalesced: a second caller
//! attaches to the in-flight fetch instead of issuing a new network call.
//! Commits retry transient network failures with bounded backoff; conflict
//! and validation failures surface immediately.

mod changeset;
mod error;
mod retry;
mod service;
mod sync;

pub use changeset::{ChangeSet, CommitResponse, IdMap};
pub use error::RemoteError;
pub use retry::RetryPolicy;
pub use service::{HttpTileService, TileService};
pub use sync::{RemoteSync, TileLoad};

#[cfg(test)]
pub use service::tests::MockTileService;
