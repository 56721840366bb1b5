//! Sliced task trait and scheduling priority.

use std::time::Duration;

/// Priority value for interactive work the user is waiting on.
pub const PRIORITY_INTERACTIVE: i32 = 100;

/// Priority value for background recomputation.
pub const PRIORITY_BACKGROUND: i32 = 0;

/// Priority value for housekeeping.
pub const PRIORITY_HOUSEKEEPING: i32 = -50;

/// Default per-slice time budget.
pub const DEFAULT_SLICE_BUDGET: Duration = Duration::from_millis(8);

/// Task scheduling priority.
///
/// Higher values run first; tasks at the same priority run in start order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    /// Work the user is actively waiting on.
    pub const INTERACTIVE: Priority = Priority(PRIORITY_INTERACTIVE);

    /// Background recomputation (the default).
    pub const BACKGROUND: Priority = Priority(PRIORITY_BACKGROUND);

    /// Cleanup work that runs when nothing else is pending.
    pub const HOUSEKEEPING: Priority = Priority(PRIORITY_HOUSEKEEPING);

    /// Creates a custom priority.
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Numeric priority value.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::BACKGROUND
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::INTERACTIVE => write!(f, "Interactive(100)"),
            Self::BACKGROUND => write!(f, "Background(0)"),
            Self::HOUSEKEEPING => write!(f, "Housekeeping(-50)"),
            Self(v) => write!(f, "Priority({})", v),
        }
    }
}

/// Outcome of one execution quantum of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// More work remains; call `exec` again.
    Continue,
    /// The task is finished; `on_done` will be called.
    Done,
}

/// A long-running computation split into small execution quanta.
///
/// The scheduler calls [`init`](Self::init) once when the task first runs,
/// then repeatedly calls [`exec`](Self::exec) within the task's slice
/// budget. Each `exec` call should do a small, bounded amount of work (one
/// feature, one chunk) so the slice deadline is respected without the task
/// having to check the clock itself.
pub trait SlicedTask: Send + 'static {
    /// Short task name for logging.
    fn name(&self) -> &str;

    /// Scheduling priority. Defaults to [`Priority::BACKGROUND`].
    fn priority(&self) -> Priority {
        Priority::BACKGROUND
    }

    /// Time budget for one slice. Defaults to [`DEFAULT_SLICE_BUDGET`].
    fn slice_budget(&self) -> Duration {
        DEFAULT_SLICE_BUDGET
    }

    /// One-time setup before the first `exec` call.
    fn init(&mut self) {}

    /// Performs one quantum of work.
    fn exec(&mut self) -> TaskState;

    /// Called once after `exec` returns [`TaskState::Done`].
    fn on_done(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::INTERACTIVE > Priority::BACKGROUND);
        assert!(Priority::BACKGROUND > Priority::HOUSEKEEPING);
        assert_eq!(Priority::default(), Priority::BACKGROUND);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::INTERACTIVE.to_string(), "Interactive(100)");
        assert_eq!(Priority::new(42).to_string(), "Priority(42)");
    }
}
