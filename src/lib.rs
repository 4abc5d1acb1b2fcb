//! Deterministic lab for cooperative scheduler queue discipline.
//!
//! `ticklab` is an executable model of a single-threaded cooperative task
//! scheduler. Its purpose is to catalog and deterministically reproduce the
//! non-obvious orderings produced by nested task creation, explicit
//! suspension points, and two distinct ways of deferring a callback into the
//! future:
//!
//! - **Direct deferral** ([`Scheduler::run_soon`]): the callback is placed on
//!   the soon queue and fires at the start of the next tick — one hop.
//! - **Task-wrapped deferral** ([`Cx::defer_task`]): a task is spawned whose
//!   body performs a single zero-delay wait, and the callback is attached as
//!   its completion callback — three hops (first resume, completion,
//!   soon-queue drain).
//!
//! The hard part is the tick discipline in [`scheduler`]: one queue pass per
//! tick, never drained to fixpoint. Everything else — the scenario registry,
//! the runner, and the console output — is thin plumbing around it.
//!
//! # Quick start
//!
//! ```ignore
//! use ticklab::{ScenarioRunner, ScenarioSet};
//!
//! let runner = ScenarioRunner::new(ScenarioSet::builtin());
//! let tokens = runner.run("task-yield")?;
//! assert_eq!(tokens, ["b", "a", "c"]);
//! ```

pub mod cx;
pub mod error;
pub mod poller;
pub mod runner;
pub mod scenario;
pub mod scheduler;
pub mod task;
pub mod test_logging;
pub mod timer;
pub mod types;
pub mod wait;

pub use cx::Cx;
pub use error::{JoinError, RegistryError, RunError};
pub use poller::interrupt_poller;
pub use runner::{RunSummary, RunnerConfig, ScenarioRunner};
pub use scenario::{Scenario, ScenarioSet};
pub use scheduler::Scheduler;
pub use task::TaskHandle;
pub use types::{TaskId, TaskState, Time};
pub use wait::Sleep;
