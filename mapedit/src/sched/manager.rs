//! The cooperative scheduler.

use super::task::{Priority, SlicedTask, TaskState};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;
use tracing::{debug, trace};

/// An active task plus its scheduling metadata.
struct ActiveTask {
    task: Box<dyn SlicedTask>,
    priority: Priority,
    /// FIFO tie-breaker within a priority level.
    sequence: u64,
    started: bool,
}

// Max-heap ordering: higher priority first, then older sequence first.
impl PartialEq for ActiveTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for ActiveTask {}

impl PartialOrd for ActiveTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActiveTask {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

/// Priority-ordered cooperative scheduler.
///
/// # Example
///
/// ```
/// use mapedit::sched::{SlicedTask, TaskManager, TaskState};
///
/// struct Count(u32);
/// impl SlicedTask for Count {
///     fn name(&self) -> &str { "count" }
///     fn exec(&mut self) -> TaskState {
///         self.0 -= 1;
///         if self.0 == 0 { TaskState::Done } else { TaskState::Continue }
///     }
/// }
///
/// let mut sched = TaskManager::new();
/// sched.start(Count(10));
/// sched.run_until_idle();
/// assert!(sched.is_idle());
/// ```
pub struct TaskManager {
    heap: BinaryHeap<ActiveTask>,
    next_sequence: u64,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Enqueues a task at its declared priority.
    pub fn start(&mut self, task: impl SlicedTask) {
        self.start_boxed(Box::new(task));
    }

    /// Enqueues an already boxed task.
    pub fn start_boxed(&mut self, task: Box<dyn SlicedTask>) {
        let priority = task.priority();
        debug!(task = task.name(), %priority, "task started");
        self.heap.push(ActiveTask {
            priority,
            sequence: self.next_sequence,
            started: false,
            task,
        });
        self.next_sequence += 1;
    }

    /// Number of active (queued or partially run) tasks.
    pub fn active(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no tasks are active.
    pub fn is_idle(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops all active tasks without running their completion hooks.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Runs the highest-priority task for one time slice.
    ///
    /// The task executes quanta until its slice budget elapses or it
    /// finishes. Unfinished tasks are re-queued (keeping their FIFO
    /// position relative to later arrivals of the same priority is not
    /// required; the slice boundary is a fair yield point).
    ///
    /// Returns true if any work was done.
    pub fn tick(&mut self) -> bool {
        let Some(mut active) = self.heap.pop() else {
            return false;
        };

        if !active.started {
            active.task.init();
            active.started = true;
        }

        let deadline = Instant::now() + active.task.slice_budget();
        loop {
            match active.task.exec() {
                TaskState::Done => {
                    debug!(task = active.task.name(), "task done");
                    active.task.on_done();
                    return true;
                }
                TaskState::Continue => {
                    if Instant::now() >= deadline {
                        trace!(task = active.task.name(), "slice budget elapsed, yielding");
                        self.heap.push(active);
                        return true;
                    }
                }
            }
        }
    }

    /// Ticks until every task has completed.
    ///
    /// Intended for tests and batch contexts; an interactive host calls
    /// [`tick`](Self::tick) between frames instead.
    pub fn run_until_idle(&mut self) {
        while self.tick() {}
    }
}
