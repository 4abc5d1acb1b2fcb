//! Pinned transcripts for every built-in scenario.
//!
//! These tests pin the exact token order each scenario emits. Any change to
//! queue discipline, spawn ordering, or poller placement shows up here as a
//! transcript diff.

use ticklab::{ScenarioRunner, ScenarioSet};

mod common {
    pub fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init();
    }
}

fn init_test(name: &str) {
    common::init_test_logging();
    ticklab::test_phase!(name);
}

fn run(name: &str) -> Vec<String> {
    let runner = ScenarioRunner::new(ScenarioSet::builtin());
    runner
        .run(name)
        .unwrap_or_else(|error| panic!("{name} failed: {error}"))
}

fn assert_transcript(name: &str, expected: &[&str]) {
    let tokens = run(name);
    ticklab::assert_with_log!(tokens == expected, "transcript pinned", expected, tokens);
}

#[test]
fn task_stall_transcript() {
    init_test("task_stall_transcript");
    assert_transcript("task-stall", &["a", "b", "c"]);
    ticklab::test_complete!("task_stall_transcript");
}

#[test]
fn task_yield_transcript() {
    init_test("task_yield_transcript");
    assert_transcript("task-yield", &["b", "a", "c"]);
    ticklab::test_complete!("task_yield_transcript");
}

#[test]
fn task_noeager_transcript() {
    init_test("task_noeager_transcript");
    assert_transcript("task-noeager", &["a", "b", "c"]);
    ticklab::test_complete!("task_noeager_transcript");
}

#[test]
fn deep1_transcript() {
    init_test("deep1_transcript");
    assert_transcript(
        "deep1",
        &[
            "3", "2", "1", "0", "in!", "0", "in!", "1", "in!", "x3", "x2", "x1", "x0", "2",
            "in!", "3",
        ],
    );
    ticklab::test_complete!("deep1_transcript");
}

#[test]
fn deep2_transcript() {
    init_test("deep2_transcript");
    assert_transcript(
        "deep2",
        &[
            "3", "2", "1", "0", "in!", "x3", "x2", "x1", "x0", "0", "in!", "1", "in!", "2",
            "in!", "3",
        ],
    );
    ticklab::test_complete!("deep2_transcript");
}

#[test]
fn interrupt_timed_transcript() {
    init_test("interrupt_timed_transcript");
    assert_transcript("interrupt-timed", &["a", "b", "in!", "c", "d"]);
    ticklab::test_complete!("interrupt_timed_transcript");
}

#[test]
fn interrupt_timed_nested_transcript() {
    init_test("interrupt_timed_nested_transcript");
    assert_transcript("interrupt-timed-nested", &["a", "b", "in!", "c", "d"]);
    ticklab::test_complete!("interrupt_timed_nested_transcript");
}

#[test]
fn interrupt_yield_transcript() {
    init_test("interrupt_yield_transcript");
    assert_transcript("interrupt-yield", &["a", "b", "in!", "c", "d"]);
    ticklab::test_complete!("interrupt_yield_transcript");
}

#[test]
fn interrupt_yield_nested_transcript() {
    init_test("interrupt_yield_nested_transcript");
    assert_transcript("interrupt-yield-nested", &["a", "b", "in!", "c", "d"]);
    ticklab::test_complete!("interrupt_yield_nested_transcript");
}

/// No trailing marker: the run that leaves the interrupt flag set at entry
/// completion must not surface one more `in!` before the poller exits.
#[test]
fn no_transcript_ends_with_a_marker() {
    init_test("no_transcript_ends_with_a_marker");
    let runner = ScenarioRunner::new(ScenarioSet::builtin());
    for scenario in runner.set().iter() {
        let tokens = runner
            .run(scenario.name())
            .unwrap_or_else(|error| panic!("{} failed: {error}", scenario.name()));
        let last = tokens.last().map(String::as_str);
        ticklab::assert_with_log!(
            last != Some("in!"),
            "final token is never a marker",
            (scenario.name(), "non-marker"),
            (scenario.name(), last)
        );
    }
    ticklab::test_complete!("no_transcript_ends_with_a_marker");
}

/// Rerunning a scenario reproduces the transcript exactly.
#[test]
fn reruns_are_deterministic() {
    init_test("reruns_are_deterministic");
    let runner = ScenarioRunner::new(ScenarioSet::builtin());
    let first = runner.run("deep1").expect("first run succeeds");
    for _ in 0..2 {
        let again = runner.run("deep1").expect("rerun succeeds");
        ticklab::assert_with_log!(again == first, "identical transcript", &first, again);
    }
    ticklab::test_complete!("reruns_are_deterministic");
}

/// Runs share nothing: a scenario's transcript is the same whether it runs
/// first or after others on the same runner.
#[test]
fn runs_are_isolated() {
    init_test("runs_are_isolated");
    let runner = ScenarioRunner::new(ScenarioSet::builtin());
    let fresh = runner.run("task-yield").expect("fresh run succeeds");
    runner.run("deep1").expect("interleaved run succeeds");
    runner.run("interrupt-timed").expect("interleaved run succeeds");
    let after = runner.run("task-yield").expect("repeat run succeeds");
    ticklab::assert_with_log!(after == fresh, "no state leaks across runs", fresh, after);
    ticklab::test_complete!("runs_are_isolated");
}

/// The pins baked into the registry agree with the pins asserted here.
#[test]
fn registry_pins_match_actual_transcripts() {
    init_test("registry_pins_match_actual_transcripts");
    let runner = ScenarioRunner::new(ScenarioSet::builtin());
    let summaries = runner.run_all().expect("all builtins run clean");
    for summary in summaries {
        ticklab::assert_with_log!(
            summary.matches_expected == Some(true),
            "registry pin holds",
            (&summary.name, Some(true)),
            (&summary.name, summary.matches_expected)
        );
    }
    ticklab::test_complete!("registry_pins_match_actual_transcripts");
}
