//! The suspension primitive.
//!
//! [`Sleep`] is the single point where a task relinquishes control. Two
//! variants share one future:
//!
//! - **zero-delay** (`duration == 0`): the task is appended to the tail of
//!   the live ready queue on the first poll. The current tick's batch is
//!   already fixed, so the task becomes eligible starting the next tick.
//! - **timed** (`duration > 0`): the task is parked in the timer set with
//!   deadline `now + duration`. It becomes eligible only once the virtual
//!   clock reaches the deadline, and then takes its FIFO turn within that
//!   tick like any other runnable task. Any number of zero-delay ticks may
//!   elapse for other tasks in the meantime.

use crate::cx::Cx;
use crate::types::{TaskState, Time};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

/// Future returned by [`Cx::sleep`] and [`Cx::yield_now`].
///
/// First poll registers the wait and suspends; second poll completes.
#[must_use = "a wait does nothing until awaited"]
pub struct Sleep {
    cx: Cx,
    duration: Time,
    registered: bool,
}

impl Sleep {
    pub(crate) fn new(cx: Cx, duration: Time) -> Self {
        Self {
            cx,
            duration,
            registered: false,
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.registered {
            return Poll::Ready(());
        }
        this.registered = true;

        let task = this.cx.task_id();
        let shared = this.cx.shared();
        let mut st = shared.lock();
        if this.duration.is_zero() {
            trace!(task = %task, tick = st.tick, "zero-delay wait, re-queued at ready tail");
            st.ready_queue.push_back(task);
            if let Some(record) = st.tasks.get_mut(&task) {
                record.state = TaskState::Runnable;
            }
        } else {
            let deadline = st.now.saturating_add(this.duration);
            trace!(task = %task, deadline_ns = deadline.as_nanos(), "timed wait registered");
            st.timer_set.insert(task, deadline);
            if let Some(record) = st.tasks.get_mut(&task) {
                record.state = TaskState::Waiting;
            }
        }
        Poll::Pending
    }
}
