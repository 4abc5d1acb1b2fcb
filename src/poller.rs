//! The interrupt poller.
//!
//! A long-running task that surfaces interrupt-flag events as `in!` tokens
//! in the scheduler log. Every iteration ends in a zero-delay wait, so the
//! poller is rescheduled every tick and observes a flag set within one tick
//! of the setting event — the whole system is single-threaded, so there are
//! no races and exactly one marker is logged per flag-set event.
//!
//! The stop check comes first: once the stop flag is raised — the runner
//! raises it in the same resumption that completes a scenario's entry task —
//! the poller terminates without consuming a still-set interrupt flag, so a
//! scenario's final log never trails a marker.

use crate::cx::Cx;
use tracing::trace;

/// Marker token logged for each observed interrupt-flag event.
pub const INTERRUPT_MARKER: &str = "in!";

/// Runs the poller until the stop flag is raised.
pub async fn interrupt_poller(cx: Cx) {
    loop {
        if cx.stop_requested() {
            trace!(task = %cx.task_id(), "poller stopping");
            break;
        }
        if cx.take_interrupt() {
            cx.log(INTERRUPT_MARKER);
        }
        cx.yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::test_logging::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    /// One marker per flag-set event, observed within one tick.
    #[test]
    fn one_marker_per_flag_event() {
        init_test("one_marker_per_flag_event");
        let sched = Scheduler::new();
        sched.spawn(interrupt_poller);
        sched.set_interrupt();

        sched.tick();
        sched.tick();
        sched.tick();
        sched.request_stop();
        sched.tick();
        crate::assert_with_log!(
            sched.is_quiescent(),
            "poller exited after stop",
            true,
            sched.is_quiescent()
        );
        let log = sched.drain_log();
        crate::assert_with_log!(
            log == vec![INTERRUPT_MARKER],
            "exactly one marker for one event",
            vec![INTERRUPT_MARKER],
            log
        );
        crate::test_complete!("one_marker_per_flag_event");
    }

    /// A flag still set when stop is raised is not surfaced.
    #[test]
    fn stop_wins_over_a_pending_flag() {
        init_test("stop_wins_over_a_pending_flag");
        let sched = Scheduler::new();
        sched.spawn(interrupt_poller);
        sched.tick();
        sched.set_interrupt();
        sched.request_stop();
        sched.tick();
        crate::assert_with_log!(
            sched.is_quiescent(),
            "poller exited without logging",
            true,
            sched.is_quiescent()
        );
        let log = sched.drain_log();
        crate::assert_with_log!(log.is_empty(), "no trailing marker", true, log.is_empty());
        crate::test_complete!("stop_wins_over_a_pending_flag");
    }
}
