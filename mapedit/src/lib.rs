//! mapedit: a client-side editing engine for tiled geospatial data.
//!
//! The engine keeps vector features partitioned into Web Mercator tiles,
//! answers spatial and id queries from per-tile R-tree indexes, and tracks
//! every mutation in a reversible edit history. A remote feature service
//! backs the local store: tiles are fetched on demand and local change sets
//! are committed back atomically.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────┐
//!        undo/redo │  Editor  │ snap tools, batches
//!                  └────┬─────┘
//!         ┌─────────────┼──────────────┐
//!         ▼             ▼              ▼
//!   ┌──────────┐  ┌──────────┐  ┌─────────────┐
//!   │ History  │  │ Provider │  │ TaskManager │
//!   │ Manager  │  │ (tiles,  │  │ (sliced     │
//!   └──────────┘  │  index)  │  │  tasks)     │
//!                 └────┬─────┘  └─────────────┘
//!                      ▼
//!                ┌────────────┐       ┌─────────────┐
//!                │ RemoteSync │ ────► │ TileService │
//!                └────────────┘       └─────────────┘
//! ```
//!
//! Everything above the [`remote`] layer is synchronous: mutations run to
//! completion, and asynchronous results (tile payloads, re-index plans)
//! enter the store only when the host calls [`Editor::pump`](editor::Editor::pump)
//! between frames.
//!
//! # Example
//!
//! ```
//! use mapedit::editor::Editor;
//! use mapedit::geom::{Feature, Geometry, LonLat};
//! use mapedit::store::{ProviderConfig, Query};
//!
//! let mut editor = Editor::new();
//! editor.add_provider(ProviderConfig::new("pois"));
//!
//! let store = editor.provider_mut("pois").unwrap();
//! let kiosk = Feature::new(Geometry::Point(LonLat::new(13.4, 52.5)))
//!     .prop("name", "kiosk");
//! store.add_feature(kiosk, None).unwrap();
//!
//! let hits = store.search(&Query::radius(LonLat::new(13.4, 52.5), 100.0));
//! assert_eq!(hits.count(), 1);
//!
//! editor.undo();
//! assert_eq!(editor.provider("pois").unwrap().feature_count(), 0);
//! ```

pub mod coord;
pub mod editor;
pub mod geom;
pub mod history;
pub mod index;
pub mod remote;
pub mod sched;
pub mod store;
pub mod style;
