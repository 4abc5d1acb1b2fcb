//! Error types for ticklab.
//!
//! Errors are restricted to registry misuse, harness-level misuse, and
//! computation failures. Scheduler-internal invariant violations (ticking
//! after teardown, resuming a task twice within one tick) are programmer
//! errors and fail loudly with assertions instead — silent reordering would
//! defeat the point of a determinism lab. There is no retry policy anywhere:
//! a stuck timer or an unreachable soon-queue entry is a correctness bug in
//! the scheduler, not a recoverable fault.

use std::fmt;
use std::sync::Arc;

/// Errors produced while building a scenario registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The entry point is not a usable computation (empty scenario name).
    InvalidComputation,
    /// A scenario with this name is already registered.
    Duplicate(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidComputation => write!(f, "invalid computation: empty scenario name"),
            Self::Duplicate(name) => write!(f, "scenario already registered: {name}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Errors produced by the scenario runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// No scenario with this name in the registry.
    UnknownScenario(String),
    /// The run did not reach quiescence within the tick budget.
    ///
    /// This indicates a correctness bug in a fixture or the scheduler, never
    /// a transient condition.
    Stalled {
        /// Scenario name.
        scenario: String,
        /// Ticks executed before giving up.
        ticks: u64,
    },
    /// The scenario's entry task failed instead of completing.
    EntryFailed {
        /// Scenario name.
        scenario: String,
        /// Panic message captured from the failing resumption.
        message: Arc<str>,
    },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownScenario(name) => write!(f, "unknown scenario: {name}"),
            Self::Stalled { scenario, ticks } => {
                write!(f, "scenario {scenario} stalled after {ticks} ticks")
            }
            Self::EntryFailed { scenario, message } => {
                write!(f, "scenario {scenario} entry task failed: {message}")
            }
        }
    }
}

impl std::error::Error for RunError {}

/// Error returned when awaiting a task that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// The awaited task panicked during a resumption.
    Failed(Arc<str>),
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(message) => write!(f, "awaited task failed: {message}"),
        }
    }
}

impl std::error::Error for JoinError {}
