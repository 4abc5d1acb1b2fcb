//! Drives a scenario to completion on a fresh scheduler.
//!
//! Each run gets its own scheduler, so scenarios are fully isolated and a
//! run of the same scenario always produces the same transcript. The runner
//! spawns the entry task first and the interrupt poller second, so the
//! entry task owns the first resumption slot of every tick it is runnable
//! in. The entry task is wrapped so that the resumption that completes it
//! also raises the stop flag; the poller then exits before it can surface
//! a still-set interrupt flag, keeping transcripts free of trailing
//! markers.
//!
//! Virtual time advances lazily. When a tick would accomplish nothing but
//! the poller's idle spin while timers are pending, the runner advances the
//! clock to the next deadline first.

use crate::error::RunError;
use crate::poller::interrupt_poller;
use crate::scenario::ScenarioSet;
use crate::scheduler::Scheduler;
use crate::types::TaskState;
use tracing::{debug, info};

/// Knobs for a runner.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Tick ceiling per run. A run that exceeds it is reported as stalled.
    pub max_ticks: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_ticks: 10_000 }
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Scenario name.
    pub name: String,
    /// The transcript, in emission order.
    pub tokens: Vec<String>,
    /// Whether the transcript matched the pinned one, if any was pinned.
    pub matches_expected: Option<bool>,
}

/// Runs scenarios from a [`ScenarioSet`].
pub struct ScenarioRunner {
    set: ScenarioSet,
    config: RunnerConfig,
}

impl ScenarioRunner {
    /// Creates a runner with the default configuration.
    #[must_use]
    pub fn new(set: ScenarioSet) -> Self {
        Self::with_config(set, RunnerConfig::default())
    }

    /// Creates a runner with an explicit configuration.
    #[must_use]
    pub fn with_config(set: ScenarioSet, config: RunnerConfig) -> Self {
        Self { set, config }
    }

    /// The scenario set this runner draws from.
    #[must_use]
    pub fn set(&self) -> &ScenarioSet {
        &self.set
    }

    /// Runs one scenario to quiescence and returns its transcript.
    pub fn run(&self, name: &str) -> Result<Vec<String>, RunError> {
        let scenario = self
            .set
            .get(name)
            .ok_or_else(|| RunError::UnknownScenario(name.to_string()))?;
        info!(scenario = name, "run start");

        let sched = Scheduler::new();
        if scenario.preset_interrupt() {
            sched.set_interrupt();
        }

        // Entry first, poller second: the entry task takes the first
        // resumption slot of tick 1.
        let entry_fn = scenario.entry_fn();
        let entry = sched.spawn(move |cx| async move {
            entry_fn(cx.clone()).await;
            cx.request_stop();
        });
        let poller = sched.spawn(interrupt_poller);
        let poller_id = poller.id();

        let mut ticks: u64 = 0;
        while !sched.is_quiescent() {
            // A panicking entry never reaches its stop request; raise it
            // here so the poller can wind down.
            if entry.is_terminal() && !sched.stop_requested() {
                sched.request_stop();
            }
            if sched.soon_is_empty()
                && sched.has_pending_timers()
                && sched.ready_tasks().iter().all(|&id| id == poller_id)
            {
                sched.advance_to_next_deadline();
            }
            ticks += 1;
            if ticks > self.config.max_ticks {
                sched.teardown();
                return Err(RunError::Stalled {
                    scenario: name.to_string(),
                    ticks: self.config.max_ticks,
                });
            }
            sched.tick();
        }
        debug!(scenario = name, ticks, "run quiescent");

        if let Some(TaskState::Failed(message)) = entry.state() {
            sched.teardown();
            return Err(RunError::EntryFailed {
                scenario: name.to_string(),
                message,
            });
        }
        let tokens = sched.drain_log();
        sched.teardown();
        info!(scenario = name, tokens = tokens.len(), "run complete");
        Ok(tokens)
    }

    /// Runs every registered scenario in registration order.
    pub fn run_all(&self) -> Result<Vec<RunSummary>, RunError> {
        let mut summaries = Vec::with_capacity(self.set.len());
        for scenario in self.set.iter() {
            let tokens = self.run(scenario.name())?;
            let matches_expected = scenario.expected().map(|expected| expected == tokens);
            summaries.push(RunSummary {
                name: scenario.name().to_string(),
                tokens,
                matches_expected,
            });
        }
        Ok(summaries)
    }
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("scenarios", &self.set.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use crate::test_logging::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn unknown_scenario_is_an_error() {
        init_test("unknown_scenario_is_an_error");
        let runner = ScenarioRunner::new(ScenarioSet::new());
        let result = runner.run("missing");
        crate::assert_with_log!(
            matches!(result, Err(RunError::UnknownScenario(ref n)) if n == "missing"),
            "unknown name surfaced",
            "UnknownScenario(missing)",
            result
        );
        crate::test_complete!("unknown_scenario_is_an_error");
    }

    #[test]
    fn spinning_entry_is_reported_as_stalled() {
        init_test("spinning_entry_is_reported_as_stalled");
        let mut set = ScenarioSet::new();
        set.register(Scenario::new("spin", |cx| {
            Box::pin(async move {
                loop {
                    cx.yield_now().await;
                }
            })
        }))
        .expect("registering spin succeeds");
        let runner = ScenarioRunner::with_config(set, RunnerConfig { max_ticks: 32 });
        let result = runner.run("spin");
        crate::assert_with_log!(
            matches!(result, Err(RunError::Stalled { ticks: 32, .. })),
            "stall detected at the tick ceiling",
            "Stalled at 32 ticks",
            result
        );
        crate::test_complete!("spinning_entry_is_reported_as_stalled");
    }

    #[test]
    fn entry_panic_surfaces_as_entry_failed() {
        init_test("entry_panic_surfaces_as_entry_failed");
        let mut set = ScenarioSet::new();
        set.register(Scenario::new("boom", |cx| {
            Box::pin(async move {
                cx.log("before");
                panic!("scripted failure");
            })
        }))
        .expect("registering boom succeeds");
        let runner = ScenarioRunner::new(set);
        let result = runner.run("boom");
        crate::assert_with_log!(
            matches!(
                result,
                Err(RunError::EntryFailed { ref message, .. }) if &**message == "scripted failure"
            ),
            "panic message carried through",
            "EntryFailed(scripted failure)",
            result
        );
        crate::test_complete!("entry_panic_surfaces_as_entry_failed");
    }

    #[test]
    fn run_all_reports_every_builtin_as_matching() {
        init_test("run_all_reports_every_builtin_as_matching");
        let runner = ScenarioRunner::new(ScenarioSet::builtin());
        let summaries = runner.run_all().expect("all builtins run clean");
        crate::assert_with_log!(
            summaries.len() == runner.set().len(),
            "one summary per scenario",
            runner.set().len(),
            summaries.len()
        );
        for summary in &summaries {
            crate::assert_with_log!(
                summary.matches_expected == Some(true),
                "transcript matches its pin",
                (&summary.name, Some(true)),
                (&summary.name, summary.matches_expected)
            );
        }
        crate::test_complete!("run_all_reports_every_builtin_as_matching");
    }
}
