//! Core types for the ticklab scheduler.
//!
//! - [`TaskId`]: dense per-scheduler task identifier
//! - [`Time`]: virtual time in nanoseconds
//! - [`TaskState`]: the task lifecycle state machine

use std::fmt;
use std::sync::Arc;

/// Identifier of a task within one scheduler instance.
///
/// Ids are assigned densely in spawn order and are never reused by the
/// scheduler that issued them. They carry no meaning across scheduler
/// instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    /// Returns the raw index of this id.
    #[must_use]
    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Virtual time in nanoseconds since scheduler creation.
///
/// The clock only moves when the driving loop advances it; ticks themselves
/// consume no virtual time, so arbitrarily many zero-delay ticks may elapse
/// while a timed wait is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Time(u64);

impl Time {
    /// Time zero.
    pub const ZERO: Self = Self(0);

    /// Creates a time from milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    /// Creates a time from nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the time as nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Returns the time as whole milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Returns true if this is time zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating addition of a duration expressed as a `Time`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Lifecycle state of a task.
///
/// Transitions: `Created → Runnable → Running → (Waiting → Runnable)* →
/// Done | Failed`. Once terminal, a task never transitions again; its
/// completion callbacks are flushed onto the soon queue exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Record exists but the task has not been enqueued yet.
    Created,
    /// In the ready queue (or the current tick's resumption batch).
    Runnable,
    /// Currently being resumed; its future is checked out of the record.
    Running,
    /// Suspended on a timer or on another task's completion.
    Waiting,
    /// Completed; the result is available to awaiters.
    Done,
    /// The computation panicked during a resumption.
    Failed(Arc<str>),
}

impl TaskState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}
