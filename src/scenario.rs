//! Scenario registry and the built-in fixture catalog.
//!
//! A scenario is a named entry-point computation plus two knobs: whether
//! the shared interrupt flag starts set, and (optionally) the expected
//! token transcript. The registry is built by ordinary calls before any
//! execution begins — registration is never a side effect of defining a
//! routine.
//!
//! The built-in fixtures are deliberately thin: each logs identifying
//! tokens, optionally recurses with a decreasing counter, optionally defers
//! a callback (direct or task-wrapped), and performs zero-delay or timed
//! waits. They exist to pin down the scheduler's hop-count laws, and their
//! transcripts are exact.

use crate::cx::Cx;
use crate::error::RegistryError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed scenario body.
pub type EntryFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Constructor for a scenario body, invoked once per run with the entry
/// task's own context.
pub type EntryFn = Arc<dyn Fn(Cx) -> EntryFuture + Send + Sync>;

/// A registered scenario.
#[derive(Clone)]
pub struct Scenario {
    name: String,
    description: String,
    preset_interrupt: bool,
    expected: Option<Vec<String>>,
    entry: EntryFn,
}

impl Scenario {
    /// Creates a scenario from a name and an entry-point constructor.
    pub fn new(
        name: impl Into<String>,
        entry: impl Fn(Cx) -> EntryFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            preset_interrupt: false,
            expected: None,
            entry: Arc::new(entry),
        }
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets whether the shared interrupt flag starts set for this scenario.
    #[must_use]
    pub fn with_preset_interrupt(mut self, preset: bool) -> Self {
        self.preset_interrupt = preset;
        self
    }

    /// Pins the expected token transcript.
    #[must_use]
    pub fn with_expected(mut self, expected: &[&str]) -> Self {
        self.expected = Some(expected.iter().map(|t| (*t).to_string()).collect());
        self
    }

    /// Scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description (may be empty).
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// True if the interrupt flag starts set.
    #[must_use]
    pub fn preset_interrupt(&self) -> bool {
        self.preset_interrupt
    }

    /// The pinned transcript, if one was recorded.
    #[must_use]
    pub fn expected(&self) -> Option<&[String]> {
        self.expected.as_deref()
    }

    pub(crate) fn entry_fn(&self) -> EntryFn {
        Arc::clone(&self.entry)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("preset_interrupt", &self.preset_interrupt)
            .field("expected", &self.expected)
            .finish()
    }
}

/// An ordered, name-indexed set of scenarios.
#[derive(Default)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
    index: HashMap<String, usize>,
}

impl ScenarioSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scenario. Empty and duplicate names are rejected.
    pub fn register(&mut self, scenario: Scenario) -> Result<(), RegistryError> {
        if scenario.name.is_empty() {
            return Err(RegistryError::InvalidComputation);
        }
        if self.index.contains_key(&scenario.name) {
            return Err(RegistryError::Duplicate(scenario.name));
        }
        self.index
            .insert(scenario.name.clone(), self.scenarios.len());
        self.scenarios.push(scenario);
        Ok(())
    }

    /// Looks a scenario up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.index.get(name).map(|&i| &self.scenarios[i])
    }

    /// Scenarios in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    /// Scenario names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of registered scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// The built-in catalog.
    #[allow(clippy::too_many_lines)]
    #[must_use]
    pub fn builtin() -> Self {
        let mut set = Self::new();
        let mut add = |scenario: Scenario| {
            set.register(scenario)
                .expect("builtin scenario names are unique and non-empty");
        };

        add(
            Scenario::new("task-stall", |cx| Box::pin(fixtures::task_stall(cx)))
                .with_description("calling a computation runs nothing until it is awaited")
                .with_expected(&["a", "b", "c"]),
        );
        add(
            Scenario::new("task-yield", |cx| Box::pin(fixtures::task_yield(cx)))
                .with_description("a spawned task runs once the creator yields")
                .with_expected(&["b", "a", "c"]),
        );
        add(
            Scenario::new("task-noeager", |cx| Box::pin(fixtures::task_noeager(cx)))
                .with_description("spawning never runs the body before the creator suspends")
                .with_expected(&["a", "b", "c"]),
        );
        add(
            Scenario::new("deep1", |cx| fixtures::deep_task_wrapped(cx, 3))
                .with_description("task-wrapped deferral at each recursion level (3-hop law)")
                .with_preset_interrupt(true)
                .with_expected(&[
                    "3", "2", "1", "0", "in!", "0", "in!", "1", "in!", "x3", "x2", "x1", "x0",
                    "2", "in!", "3",
                ]),
        );
        add(
            Scenario::new("deep2", |cx| fixtures::deep_run_soon(cx, 3))
                .with_description("direct deferral at each recursion level (1-hop law)")
                .with_preset_interrupt(true)
                .with_expected(&[
                    "3", "2", "1", "0", "in!", "x3", "x2", "x1", "x0", "0", "in!", "1", "in!",
                    "2", "in!", "3",
                ]),
        );
        add(
            Scenario::new("interrupt-timed", |cx| {
                Box::pin(fixtures::interrupt_timed(cx))
            })
            .with_description("timed wait between two pairs of flag-raising logs")
            .with_preset_interrupt(true)
            .with_expected(&["a", "b", "in!", "c", "d"]),
        );
        add(
            Scenario::new("interrupt-timed-nested", |cx| {
                Box::pin(fixtures::interrupt_timed_nested(cx))
            })
            .with_description("same as interrupt-timed, refactored through an awaited sub-computation")
            .with_preset_interrupt(true)
            .with_expected(&["a", "b", "in!", "c", "d"]),
        );
        add(
            Scenario::new("interrupt-yield", |cx| {
                Box::pin(fixtures::interrupt_yield(cx))
            })
            .with_description("zero-delay variant of interrupt-timed")
            .with_preset_interrupt(true)
            .with_expected(&["a", "b", "in!", "c", "d"]),
        );
        add(
            Scenario::new("interrupt-yield-nested", |cx| {
                Box::pin(fixtures::interrupt_yield_nested(cx))
            })
            .with_description("zero-delay variant, refactored through an awaited sub-computation")
            .with_preset_interrupt(true)
            .with_expected(&["a", "b", "in!", "c", "d"]),
        );

        set
    }
}

impl std::fmt::Debug for ScenarioSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioSet")
            .field("names", &self.names())
            .finish()
    }
}

/// Logs a token and raises the shared interrupt flag in one step, so the
/// poller surfaces a marker for it.
pub fn say(cx: &Cx, token: impl Into<String>) {
    cx.log(token);
    cx.set_interrupt();
}

mod fixtures {
    use super::{say, EntryFuture};
    use crate::cx::Cx;
    use crate::types::Time;

    async fn emit_b_then_c(cx: Cx) -> String {
        cx.log("b");
        String::from("c")
    }

    pub(super) async fn task_stall(cx: Cx) {
        // Never spawned: the body runs inline at the await below.
        let stalled = emit_b_then_c(cx.clone());
        cx.sleep(Time::from_millis(100)).await;
        cx.log("a");
        cx.sleep(Time::from_millis(100)).await;
        let value = stalled.await;
        cx.log(value);
    }

    pub(super) async fn task_yield(cx: Cx) {
        let pending = cx.spawn(emit_b_then_c);
        cx.yield_now().await;
        cx.log("a");
        match pending.join(&cx).await {
            Ok(value) => cx.log(value),
            Err(error) => cx.log(format!("error: {error}")),
        }
    }

    pub(super) async fn task_noeager(cx: Cx) {
        let pending = cx.spawn(emit_b_then_c);
        cx.log("a");
        match pending.join(&cx).await {
            Ok(value) => cx.log(value),
            Err(error) => cx.log(format!("error: {error}")),
        }
    }

    /// Logs the level, registers a task-wrapped deferral, descends, then
    /// yields once and logs the level again on unwind.
    pub(super) fn deep_task_wrapped(cx: Cx, level: u32) -> EntryFuture {
        Box::pin(async move {
            say(&cx, level.to_string());
            let marker = cx.clone();
            cx.defer_task(move || marker.log(format!("x{level}")));
            if level > 0 {
                deep_task_wrapped(cx.clone(), level - 1).await;
            }
            cx.yield_now().await;
            say(&cx, level.to_string());
        })
    }

    /// Same shape as [`deep_task_wrapped`] with a direct deferral instead.
    pub(super) fn deep_run_soon(cx: Cx, level: u32) -> EntryFuture {
        Box::pin(async move {
            say(&cx, level.to_string());
            let marker = cx.clone();
            cx.run_soon(move || marker.log(format!("x{level}")));
            if level > 0 {
                deep_run_soon(cx.clone(), level - 1).await;
            }
            cx.yield_now().await;
            say(&cx, level.to_string());
        })
    }

    pub(super) async fn interrupt_timed(cx: Cx) {
        say(&cx, "a");
        say(&cx, "b");
        cx.sleep(Time::from_millis(100)).await;
        say(&cx, "c");
        say(&cx, "d");
    }

    async fn timed_middle(cx: Cx) {
        say(&cx, "b");
        cx.sleep(Time::from_millis(100)).await;
        say(&cx, "c");
    }

    pub(super) async fn interrupt_timed_nested(cx: Cx) {
        say(&cx, "a");
        timed_middle(cx.clone()).await;
        say(&cx, "d");
    }

    pub(super) async fn interrupt_yield(cx: Cx) {
        say(&cx, "a");
        say(&cx, "b");
        cx.yield_now().await;
        say(&cx, "c");
        say(&cx, "d");
    }

    async fn yield_middle(cx: Cx) {
        say(&cx, "b");
        cx.yield_now().await;
        say(&cx, "c");
    }

    pub(super) async fn interrupt_yield_nested(cx: Cx) {
        say(&cx, "a");
        yield_middle(cx.clone()).await;
        say(&cx, "d");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_logging::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn empty_name_is_an_invalid_computation() {
        init_test("empty_name_is_an_invalid_computation");
        let mut set = ScenarioSet::new();
        let result = set.register(Scenario::new("", |_cx| Box::pin(async {})));
        crate::assert_with_log!(
            result == Err(RegistryError::InvalidComputation),
            "empty name rejected",
            Err::<(), _>(RegistryError::InvalidComputation),
            result
        );
        crate::test_complete!("empty_name_is_an_invalid_computation");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        init_test("duplicate_names_are_rejected");
        let mut set = ScenarioSet::new();
        set.register(Scenario::new("twice", |_cx| Box::pin(async {})))
            .expect("first registration succeeds");
        let result = set.register(Scenario::new("twice", |_cx| Box::pin(async {})));
        crate::assert_with_log!(
            result == Err(RegistryError::Duplicate(String::from("twice"))),
            "duplicate rejected",
            Err::<(), _>(RegistryError::Duplicate(String::from("twice"))),
            result
        );
        crate::test_complete!("duplicate_names_are_rejected");
    }

    #[test]
    fn builtin_catalog_is_complete() {
        init_test("builtin_catalog_is_complete");
        let set = ScenarioSet::builtin();
        for name in [
            "task-stall",
            "task-yield",
            "task-noeager",
            "deep1",
            "deep2",
            "interrupt-timed",
            "interrupt-timed-nested",
            "interrupt-yield",
            "interrupt-yield-nested",
        ] {
            crate::assert_with_log!(
                set.get(name).is_some(),
                "builtin scenario present",
                name,
                set.get(name).map(Scenario::name)
            );
        }
        let all_pinned = set.iter().all(|s| s.expected().is_some());
        crate::assert_with_log!(
            all_pinned,
            "every builtin transcript is pinned",
            true,
            all_pinned
        );
        crate::test_complete!("builtin_catalog_is_complete");
    }
}
