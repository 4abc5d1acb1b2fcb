//! The timer set: tasks keyed by virtual wake deadline.
//!
//! A min-heap of `(deadline, sequence, task)` entries. The sequence number
//! breaks deadline ties so that tasks registered at the same instant are
//! promoted in registration order — the ready queue's FIFO discipline must
//! hold even for simultaneous wakeups.

use crate::types::{TaskId, Time};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Pending timed waits, ordered by earliest deadline.
#[derive(Debug, Default)]
pub struct TimerSet {
    heap: BinaryHeap<Reverse<(Time, u64, TaskId)>>,
    next_seq: u64,
}

impl TimerSet {
    /// Creates an empty timer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Registers `task` to wake once the virtual clock reaches `deadline`.
    pub fn insert(&mut self, task: TaskId, deadline: Time) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((deadline, seq, task)));
    }

    /// Earliest pending deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.heap.peek().map(|Reverse((deadline, _, _))| *deadline)
    }

    /// Removes and returns every task whose deadline is at or before `now`,
    /// in (deadline, registration) order.
    pub fn pop_expired(&mut self, now: Time) -> Vec<TaskId> {
        let mut expired = Vec::new();
        while let Some(Reverse((deadline, _, _))) = self.heap.peek() {
            if *deadline > now {
                break;
            }
            if let Some(Reverse((_, _, task))) = self.heap.pop() {
                expired.push(task);
            }
        }
        expired
    }

    /// Drops all pending timers.
    pub fn clear(&mut self) {
        self.heap.clear();
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

    fn task(n: u64) -> TaskId {
        TaskId(n)
    }

    #[test]
    fn empty_set_has_no_deadline() {
        init_test("empty_set_has_no_deadline");
        let set = TimerSet::new();
        crate::assert_with_log!(set.is_empty(), "set starts empty", true, set.is_empty());
        crate::assert_with_log!(
            set.next_deadline().is_none(),
            "empty set has no deadline",
            None::<Time>,
            set.next_deadline()
        );
        crate::test_complete!("empty_set_has_no_deadline");
    }

    #[test]
    fn earliest_deadline_wins() {
        init_test("earliest_deadline_wins");
        let mut set = TimerSet::new();
        set.insert(task(1), Time::from_millis(200));
        set.insert(task(2), Time::from_millis(100));
        set.insert(task(3), Time::from_millis(150));
        crate::assert_with_log!(
            set.next_deadline() == Some(Time::from_millis(100)),
            "earliest deadline at top",
            Some(Time::from_millis(100)),
            set.next_deadline()
        );
        crate::test_complete!("earliest_deadline_wins");
    }

    #[test]
    fn pop_expired_returns_due_tasks_only() {
        init_test("pop_expired_returns_due_tasks_only");
        let mut set = TimerSet::new();
        set.insert(task(1), Time::from_millis(100));
        set.insert(task(2), Time::from_millis(200));
        set.insert(task(3), Time::from_millis(50));

        let expired = set.pop_expired(Time::from_millis(125));
        crate::assert_with_log!(
            expired == vec![task(3), task(1)],
            "due tasks in deadline order",
            vec![task(3), task(1)],
            expired
        );
        crate::assert_with_log!(set.len() == 1, "one timer left", 1usize, set.len());
        crate::test_complete!("pop_expired_returns_due_tasks_only");
    }

    #[test]
    fn pop_expired_includes_exact_deadline() {
        init_test("pop_expired_includes_exact_deadline");
        let mut set = TimerSet::new();
        let deadline = Time::from_millis(250);
        set.insert(task(7), deadline);
        let expired = set.pop_expired(deadline);
        crate::assert_with_log!(
            expired == vec![task(7)],
            "exact deadline counts as expired",
            vec![task(7)],
            expired
        );
        crate::test_complete!("pop_expired_includes_exact_deadline");
    }

    /// Invariant: same-deadline timers are promoted in registration order.
    #[test]
    fn same_deadline_is_fifo() {
        init_test("same_deadline_is_fifo");
        let mut set = TimerSet::new();
        let deadline = Time::from_millis(100);
        set.insert(task(5), deadline);
        set.insert(task(4), deadline);
        set.insert(task(9), deadline);
        let expired = set.pop_expired(deadline);
        crate::assert_with_log!(
            expired == vec![task(5), task(4), task(9)],
            "registration order preserved",
            vec![task(5), task(4), task(9)],
            expired
        );
        crate::test_complete!("same_deadline_is_fifo");
    }

    #[test]
    fn clear_empties_the_set() {
        init_test("clear_empties_the_set");
        let mut set = TimerSet::new();
        set.insert(task(1), Time::from_millis(10));
        set.insert(task(2), Time::from_millis(20));
        set.clear();
        crate::assert_with_log!(set.is_empty(), "empty after clear", true, set.is_empty());
        crate::test_complete!("clear_empties_the_set");
    }
}
