//! The capability context type.
//!
//! `Cx` is the token that grants a task access to its scheduler:
//!
//! - spawning child tasks and deferring callbacks (direct or task-wrapped)
//! - suspending (zero-delay or timed waits)
//! - appending tokens to the scheduler-scoped log
//! - reading and writing the shared interrupt/stop flags
//!
//! All effectful operations flow through an explicit `Cx`; there is no
//! ambient scheduler and no process-wide state. Each task receives its own
//! context when spawned, and the context identifies the task for routing:
//! a zero-delay wait re-queues *this* task, a join suspends *this* task.
//!
//! `Cx` holds a weak reference to the scheduler, so stored futures (which
//! capture their `Cx`) never keep a torn-down scheduler alive. Using a `Cx`
//! after its scheduler is gone is a programmer error and fails loudly.

use crate::scheduler::{spawn_task, SchedState};
use crate::task::TaskHandle;
use crate::types::{TaskId, Time};
use crate::wait::Sleep;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::trace;

/// The capability context for a task.
#[derive(Clone)]
pub struct Cx {
    shared: Weak<Mutex<SchedState>>,
    task: TaskId,
}

impl Cx {
    pub(crate) fn new(shared: Weak<Mutex<SchedState>>, task: TaskId) -> Self {
        Self { shared, task }
    }

    pub(crate) fn shared(&self) -> Arc<Mutex<SchedState>> {
        match self.shared.upgrade() {
            Some(shared) => shared,
            None => panic!("{} used its context after scheduler teardown", self.task),
        }
    }

    /// The id of the task this context belongs to.
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Current tick number of the owning scheduler.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.shared().lock().tick
    }

    /// Current virtual time of the owning scheduler.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared().lock().now
    }

    /// Appends a token to the scheduler-scoped log.
    pub fn log(&self, token: impl Into<String>) {
        let token = token.into();
        trace!(task = %self.task, token = %token, "log");
        self.shared().lock().log.push(token);
    }

    /// Spawns a child task on the owning scheduler. The body runs no
    /// earlier than the next tick's resumption phase.
    pub fn spawn<F, Fut, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Clone + Send + 'static,
    {
        spawn_task(&self.shared(), f)
    }

    /// Direct deferral: `callback` fires at the start of the next tick
    /// (one hop).
    pub fn run_soon(&self, callback: impl FnOnce() + Send + 'static) {
        self.shared().lock().soon_queue.push_back(Box::new(callback));
    }

    /// Task-wrapped deferral: spawns a task whose body performs exactly one
    /// zero-delay wait before completing, and attaches `callback` as its
    /// completion callback. The callback fires three ticks after this call:
    /// first resume, completing resume, soon drain.
    pub fn defer_task(&self, callback: impl FnOnce() + Send + 'static) -> TaskHandle<()> {
        let handle = self.spawn(|cx| async move {
            cx.yield_now().await;
        });
        handle.on_complete(callback);
        handle
    }

    /// Suspends the calling task for `duration` of virtual time.
    ///
    /// Zero duration re-queues the task at the ready tail (eligible next
    /// tick); positive duration parks it in the timer set until the virtual
    /// clock reaches `now + duration`.
    #[must_use]
    pub fn sleep(&self, duration: Time) -> Sleep {
        Sleep::new(self.clone(), duration)
    }

    /// Zero-delay wait: yields this tick's turn, eligible again next tick.
    #[must_use]
    pub fn yield_now(&self) -> Sleep {
        self.sleep(Time::ZERO)
    }

    /// Sets the shared interrupt flag.
    pub fn set_interrupt(&self) {
        self.shared().lock().interrupt = true;
    }

    /// Clears and returns the shared interrupt flag.
    pub fn take_interrupt(&self) -> bool {
        let shared = self.shared();
        let mut st = shared.lock();
        std::mem::take(&mut st.interrupt)
    }

    /// Raises the stop flag.
    pub fn request_stop(&self) {
        self.shared().lock().stop = true;
    }

    /// True once the stop flag has been raised.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.shared().lock().stop
    }
}

impl std::fmt::Debug for Cx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cx").field("task", &self.task).finish()
    }
}
