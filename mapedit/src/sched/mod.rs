//! Cooperative task scheduling.
//!
//! Long computations (bulk re-indexing, geometry recompute) run as
//! [`SlicedTask`]s: the scheduler executes the highest-priority active task
//! for one bounded time slice, then yields control back to the host loop.
//! Tasks at the same priority run FIFO. This is a cooperative scheduler for
//! a single-threaded host, not a thread pool; the host drives it by calling
//! [`TaskManager::tick`] between frames.
//!
//! There is no global scheduler instance. Construct a [`TaskManager`] and
//! pass it to whoever needs to start work.

mod manager;
mod task;

pub use manager::TaskManager;
pub use task::{Priority, SlicedTask, TaskState};
