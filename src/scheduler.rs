//! The scheduler core: queues, virtual clock, and the per-tick step.
//!
//! One [`Scheduler`] owns a ready queue (FIFO of resumable tasks), a soon
//! queue (FIFO of zero-argument callbacks), a timer set, a tick counter, a
//! virtual clock, and a scheduler-scoped token log. [`Scheduler::tick`] is
//! the sole step function; the driving loop calls it repeatedly until the
//! system is quiescent.
//!
//! # Tick discipline
//!
//! Each tick performs one pass over snapshots taken at tick start:
//!
//! 1. drain the soon-queue snapshot in FIFO order;
//! 2. promote timers whose deadline the virtual clock has reached onto the
//!    tail of this tick's resumption batch;
//! 3. resume every batch task exactly once, in FIFO order, until it next
//!    suspends or completes.
//!
//! Anything enqueued while the tick runs — by a soon callback or by a
//! resuming task — lands in the live queues and is processed on a later
//! tick, never within the current pass. This "one queue pass per tick"
//! rule is what gives direct deferral its 1-hop latency and task-wrapped
//! deferral its 3-hop latency; draining to fixpoint would collapse both.
//!
//! # Invariants (assertion-fatal when violated)
//!
//! - a task is never resumed twice within one tick;
//! - a task is never resumed while its future is checked out;
//! - `tick`, `spawn`, and clock advancement are rejected after teardown.

use crate::cx::Cx;
use crate::task::{panic_message, TaskHandle, TaskRecord};
use crate::timer::TimerSet;
use crate::types::{TaskId, TaskState, Time};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use tracing::{debug, trace};

/// A callback deferred onto the soon queue.
pub(crate) type SoonCallback = Box<dyn FnOnce() + Send>;

/// A stored, type-erased task body.
pub(crate) type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Mutable scheduler state behind the shared lock.
pub(crate) struct SchedState {
    pub(crate) tick: u64,
    pub(crate) now: Time,
    pub(crate) ready_queue: VecDeque<TaskId>,
    pub(crate) soon_queue: VecDeque<SoonCallback>,
    pub(crate) timer_set: TimerSet,
    pub(crate) tasks: HashMap<TaskId, TaskRecord>,
    pub(crate) log: Vec<String>,
    pub(crate) interrupt: bool,
    pub(crate) stop: bool,
    pub(crate) torn_down: bool,
    next_task: u64,
}

impl SchedState {
    fn new() -> Self {
        Self {
            tick: 0,
            now: Time::ZERO,
            ready_queue: VecDeque::new(),
            soon_queue: VecDeque::new(),
            timer_set: TimerSet::new(),
            tasks: HashMap::new(),
            log: Vec::new(),
            interrupt: false,
            stop: false,
            torn_down: false,
            next_task: 0,
        }
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        id
    }

    /// Marks a task terminal and flushes its completion callbacks onto the
    /// soon queue. Callbacks never run synchronously within the completing
    /// step; they fire when the soon queue is next drained.
    pub(crate) fn finish_task(&mut self, id: TaskId, state: TaskState) {
        let tick = self.tick;
        let Some(record) = self.tasks.get_mut(&id) else {
            panic!("{id} completed but its record is gone");
        };
        debug!(task = %id, tick, state = ?state, callbacks = record.callbacks.len(), "task finished");
        record.state = state;
        let callbacks = std::mem::take(&mut record.callbacks);
        self.soon_queue.extend(callbacks);
    }
}

/// The routing in this model is explicit through the queues; std wakers are
/// inert on purpose.
struct InertWake;

impl Wake for InertWake {
    fn wake(self: Arc<Self>) {}
}

fn inert_waker() -> Waker {
    Waker::from(Arc::new(InertWake))
}

/// Resumes `id` exactly once: checks its future out of the record, polls it,
/// and routes the outcome (suspended again, done, or failed).
///
/// Called from the tick's resumption phase and, for awaiters, from
/// completion callbacks during the soon drain. A task whose record is gone
/// or already terminal is skipped — discarding a spawned-but-never-resumed
/// task must have no observable effect.
pub(crate) fn resume_task(shared: &Arc<Mutex<SchedState>>, id: TaskId) {
    let mut future = {
        let mut st = shared.lock();
        if st.torn_down {
            return;
        }
        let tick = st.tick;
        let Some(record) = st.tasks.get_mut(&id) else {
            return;
        };
        if record.state.is_terminal() {
            return;
        }
        assert!(
            record.last_resumed_tick != Some(tick),
            "{id} resumed twice within tick {tick}"
        );
        record.last_resumed_tick = Some(tick);
        let Some(future) = record.future.take() else {
            panic!("{id} resumed while its future is checked out");
        };
        record.state = TaskState::Running;
        trace!(task = %id, tick, "resuming task");
        future
    };

    let waker = inert_waker();
    let mut poll_cx = Context::from_waker(&waker);
    let poll = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        future.as_mut().poll(&mut poll_cx)
    }));

    let mut st = shared.lock();
    if st.torn_down {
        return;
    }
    match poll {
        Ok(Poll::Pending) => {
            let Some(record) = st.tasks.get_mut(&id) else {
                panic!("{id} suspended but its record is gone");
            };
            record.future = Some(future);
            // The suspension point already routed the task (ready tail,
            // timer set, or a completion callback). Running means the
            // latter: suspended with nothing to do but wait.
            if matches!(record.state, TaskState::Running) {
                record.state = TaskState::Waiting;
            }
        }
        Ok(Poll::Ready(())) => st.finish_task(id, TaskState::Done),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            debug!(task = %id, %message, "task panicked during resumption");
            st.finish_task(id, TaskState::Failed(message));
        }
    }
}

/// Creates a task record for the future built by `f`, enqueues it at the
/// tail of the ready queue, and returns its handle.
///
/// The body never runs synchronously: it executes no earlier than the next
/// tick's resumption phase. Spawning always succeeds.
pub(crate) fn spawn_task<F, Fut, T>(shared: &Arc<Mutex<SchedState>>, f: F) -> TaskHandle<T>
where
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Clone + Send + 'static,
{
    let id = {
        let mut st = shared.lock();
        assert!(!st.torn_down, "spawn on a torn-down scheduler");
        st.allocate_task_id()
    };
    let cx = Cx::new(Arc::downgrade(shared), id);
    let body = f(cx);

    let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let slot_in = Arc::clone(&slot);
    // The result lands in the typed slot before the record turns Done, so
    // awaiters released by the state change always find it present.
    let wrapped: TaskFuture = Box::pin(async move {
        let value = body.await;
        *slot_in.lock() = Some(value);
    });

    {
        let mut st = shared.lock();
        let mut record = TaskRecord::new(id);
        record.future = Some(wrapped);
        record.state = TaskState::Runnable;
        st.tasks.insert(id, record);
        st.ready_queue.push_back(id);
        debug!(task = %id, tick = st.tick, "task spawned");
    }

    TaskHandle::new(id, Arc::downgrade(shared), slot)
}

/// A cooperative, single-threaded scheduler instance.
///
/// All state — queues, clock, flags, and the token log — is scoped to one
/// instance; nothing survives across instances. Tasks reach the scheduler
/// through the [`Cx`] handed to their body.
pub struct Scheduler {
    pub(crate) shared: Arc<Mutex<SchedState>>,
}

impl Scheduler {
    /// Creates a fresh scheduler with an empty log and the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(SchedState::new())),
        }
    }

    /// Spawns a task. The closure receives the task's own capability
    /// context; the body runs no earlier than the next tick.
    pub fn spawn<F, Fut, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce(Cx) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Clone + Send + 'static,
    {
        spawn_task(&self.shared, f)
    }

    /// Direct deferral: enqueues `callback` onto the soon queue. Registered
    /// during tick N, it fires at the very start of tick N+1 — one hop.
    pub fn run_soon(&self, callback: impl FnOnce() + Send + 'static) {
        let mut st = self.shared.lock();
        assert!(!st.torn_down, "run_soon on a torn-down scheduler");
        st.soon_queue.push_back(Box::new(callback));
    }

    /// Executes one scheduler tick. See the module docs for the discipline.
    pub fn tick(&self) {
        let (soon_batch, batch) = {
            let mut st = self.shared.lock();
            assert!(!st.torn_down, "tick on a torn-down scheduler");
            st.tick += 1;
            let soon_batch: Vec<SoonCallback> = st.soon_queue.drain(..).collect();
            let mut batch: Vec<TaskId> = st.ready_queue.drain(..).collect();
            let now = st.now;
            let expired = st.timer_set.pop_expired(now);
            for id in &expired {
                if let Some(record) = st.tasks.get_mut(id) {
                    record.state = TaskState::Runnable;
                }
            }
            trace!(
                tick = st.tick,
                soon = soon_batch.len(),
                ready = batch.len(),
                timers_promoted = expired.len(),
                now_ns = now.as_nanos(),
                "tick started"
            );
            batch.extend(expired);
            (soon_batch, batch)
        };

        for callback in soon_batch {
            callback();
        }
        for id in batch {
            resume_task(&self.shared, id);
        }
    }

    /// Current tick number. Zero before the first tick.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.shared.lock().tick
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared.lock().now
    }

    /// Advances the virtual clock to the earliest pending timer deadline.
    /// Returns false if no timers are pending.
    pub fn advance_to_next_deadline(&self) -> bool {
        let mut st = self.shared.lock();
        assert!(!st.torn_down, "clock advance on a torn-down scheduler");
        let Some(deadline) = st.timer_set.next_deadline() else {
            return false;
        };
        if deadline > st.now {
            debug!(
                from_ns = st.now.as_nanos(),
                to_ns = deadline.as_nanos(),
                "virtual clock advanced to next deadline"
            );
            st.now = deadline;
        }
        true
    }

    /// True when the ready queue, soon queue, and timer set are all empty.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        let st = self.shared.lock();
        st.ready_queue.is_empty() && st.soon_queue.is_empty() && st.timer_set.is_empty()
    }

    /// Snapshot of the live ready queue, in FIFO order.
    #[must_use]
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.shared.lock().ready_queue.iter().copied().collect()
    }

    /// True if the soon queue holds no callbacks.
    #[must_use]
    pub fn soon_is_empty(&self) -> bool {
        self.shared.lock().soon_queue.is_empty()
    }

    /// True if any timed wait is outstanding.
    #[must_use]
    pub fn has_pending_timers(&self) -> bool {
        !self.shared.lock().timer_set.is_empty()
    }

    /// Current state of a task, if the scheduler knows it.
    #[must_use]
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.shared.lock().tasks.get(&id).map(|r| r.state.clone())
    }

    /// Sets the shared interrupt flag.
    pub fn set_interrupt(&self) {
        self.shared.lock().interrupt = true;
    }

    /// Raises the stop flag observed by the interrupt poller.
    pub fn request_stop(&self) {
        self.shared.lock().stop = true;
    }

    /// True once the stop flag has been raised.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.shared.lock().stop
    }

    /// Takes the recorded token log, leaving the buffer empty.
    pub fn drain_log(&self) -> Vec<String> {
        std::mem::take(&mut self.shared.lock().log)
    }

    /// Tears the scheduler down: drops every stored future, pending
    /// callback, and timer. Unfired completion callbacks of discarded tasks
    /// never run. Further `tick`/`spawn`/`run_soon` calls are fatal.
    pub fn teardown(&self) {
        let mut st = self.shared.lock();
        st.torn_down = true;
        st.ready_queue.clear();
        st.soon_queue.clear();
        st.timer_set.clear();
        st.tasks.clear();
        debug!(tick = st.tick, "scheduler torn down");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
