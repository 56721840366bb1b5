//! Edit history.
//!
//! Records ordered, reversible edit operations grouped into steps, with a
//! cursor for undo/redo and observable counters for the editor UI.
//!
//! The manager itself never touches provider state. It stores before/after
//! feature snapshots (deep clones, not live aliases) and hands whole steps
//! back to the editor, which applies or reverts them against the owning
//! provider. That separation is what guarantees an undone step restores the
//! exact pre-edit state even if the live feature was mutated again later.

mod ops;

pub use ops::{EditKind, EditOp};

use crate::geom::FeatureId;
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::debug;

/// One undo unit: a non-empty, ordered sequence of edit operations applied
/// or reverted atomically.
#[derive(Debug, Clone)]
pub struct HistoryStep {
    ops: Vec<EditOp>,
}

impl HistoryStep {
    /// Operations in application order.
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }
}

/// Ordered history of edit steps with an undo/redo cursor.
///
/// `current` is always in `[0, steps.len()]`: it counts the steps currently
/// applied. Recording a new operation while the cursor sits before the end
/// discards the redo tail (linear history).
pub struct HistoryManager {
    steps: Vec<HistoryStep>,
    current: usize,
    open: Vec<EditOp>,
    batch_depth: u32,
    changes: u64,
    current_tx: watch::Sender<usize>,
    len_tx: watch::Sender<usize>,
    changes_tx: watch::Sender<u64>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            current: 0,
            open: Vec::new(),
            batch_depth: 0,
            changes: 0,
            current_tx: watch::Sender::new(0),
            len_tx: watch::Sender::new(0),
            changes_tx: watch::Sender::new(0),
        }
    }

    /// Number of committed steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no steps have been committed.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Cursor position: how many steps are currently applied.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Operations recorded since the last committed step.
    pub fn changes(&self) -> u64 {
        self.changes
    }

    /// Records one edit operation into the step being built.
    ///
    /// When the cursor sits before the end (a prior undo happened), the redo
    /// tail is discarded first. Outside a batch the step is committed
    /// immediately, so every standalone mutation is one undo unit.
    pub fn record(&mut self, op: EditOp) {
        if self.current < self.steps.len() {
            debug!(discarded = self.steps.len() - self.current, "truncating redo tail");
            self.steps.truncate(self.current);
            self.len_tx.send_replace(self.steps.len());
        }
        self.open.push(op);
        self.changes += 1;
        self.changes_tx.send_replace(self.changes);
        if self.batch_depth == 0 {
            self.commit_step();
        }
    }

    /// Closes the step being built and advances the cursor.
    ///
    /// No-op when no operations were recorded. Resets the `changes` counter.
    pub fn commit_step(&mut self) {
        if self.open.is_empty() {
            return;
        }
        let step = HistoryStep {
            ops: std::mem::take(&mut self.open),
        };
        debug!(ops = step.ops.len(), step = self.steps.len(), "committing history step");
        self.steps.push(step);
        self.current = self.steps.len();
        self.changes = 0;
        self.len_tx.send_replace(self.steps.len());
        self.current_tx.send_replace(self.current);
        self.changes_tx.send_replace(0);
    }

    /// Opens a batch: all operations recorded until the matching
    /// [`end_batch`](Self::end_batch) form a single step. Nestable.
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Closes a batch level; the outermost close commits the step.
    pub fn end_batch(&mut self) {
        debug_assert!(self.batch_depth > 0, "end_batch without begin_batch");
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.commit_step();
        }
    }

    /// Moves the cursor one step back and returns the step to revert.
    ///
    /// No-op returning `None` at `current == 0`.
    pub fn step_back(&mut self) -> Option<HistoryStep> {
        if self.current == 0 {
            return None;
        }
        self.current -= 1;
        self.current_tx.send_replace(self.current);
        Some(self.steps[self.current].clone())
    }

    /// Returns the step to re-apply and moves the cursor one step forward.
    ///
    /// No-op returning `None` at `current == len`.
    pub fn step_forward(&mut self) -> Option<HistoryStep> {
        if self.current >= self.steps.len() {
            return None;
        }
        let step = self.steps[self.current].clone();
        self.current += 1;
        self.current_tx.send_replace(self.current);
        Some(step)
    }

    /// Rewrites feature ids recorded for `provider` through the id map.
    ///
    /// Called after a successful commit replaces provisional ids with
    /// server-assigned ones: recorded snapshots follow the rename, so
    /// undoing or redoing a pre-commit step keeps addressing the live
    /// feature instead of resurrecting a copy under the dead id.
    pub fn rekey(&mut self, provider: &str, id_map: &HashMap<FeatureId, FeatureId>) {
        if id_map.is_empty() {
            return;
        }
        let recorded = self.steps.iter_mut().flat_map(|step| step.ops.iter_mut());
        for op in recorded.chain(self.open.iter_mut()) {
            if op.provider == provider {
                op.rekey(id_map);
            }
        }
    }

    /// Discards every step and the open batch, resetting the cursor.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.open.clear();
        self.current = 0;
        self.changes = 0;
        self.len_tx.send_replace(0);
        self.current_tx.send_replace(0);
        self.changes_tx.send_replace(0);
    }

    /// Observer for the cursor position.
    pub fn watch_current(&self) -> watch::Receiver<usize> {
        self.current_tx.subscribe()
    }

    /// Observer for the step count.
    pub fn watch_len(&self) -> watch::Receiver<usize> {
        self.len_tx.subscribe()
    }

    /// Observer for the changes counter.
    pub fn watch_changes(&self) -> watch::Receiver<u64> {
        self.changes_tx.subscribe()
    }
}
