//! Store observer events.

use crate::geom::FeatureId;

/// Events emitted by a provider on feature mutations.
///
/// Delivered on an unbounded channel handed out at provider construction;
/// the editor UI (out of scope here) subscribes to keep selection and
/// rendering state in sync. Undo/redo re-emit these events, since the
/// visible feature set changes either way.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A feature became visible in the store.
    FeatureAdd(FeatureId),
    /// A feature left the store.
    FeatureRemove(FeatureId),
}
