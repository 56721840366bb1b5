//! Feature storage: providers, tiles, queries, and store events.
//!
//! A [`Provider`] is the single source of truth for one editable data layer.
//! It partitions its features into [`Tile`]s on a fixed-zoom grid, answers
//! [`Query`]s from the per-tile spatial indexes, and tracks which features
//! have diverged from the remote since the last commit.
//!
//! # Data flow
//!
//! ```text
//!   add/remove/modify ──> Provider ──> StoreEvent channel
//!                            │
//!            search_remote   │   pump()
//!                ▼           ▼
//!           RemoteSync ──> TileLoad channel
//! ```
//!
//! Mutations are synchronous; network results enter only through
//! [`Provider::pump`]. Re-indexing after a margin change runs as a
//! background [`ReindexTask`] on the cooperative scheduler.

mod events;
pub(crate) mod provider;
mod query;
mod reindex;
mod tile;

pub use events::StoreEvent;
pub use provider::{Provider, ProviderConfig, SyncState, DEFAULT_INDEXING_ZOOM, DEFAULT_MARGIN_M};
pub use query::{Query, QueryResult};
pub use reindex::{ReindexResult, ReindexTask};
pub use tile::{Tile, TileStatus};
