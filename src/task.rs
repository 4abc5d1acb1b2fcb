//! The task wrapper: records, handles, and awaiting.
//!
//! A [`TaskRecord`] is the scheduler-owned side of a task: its state
//! machine, its ordered completion-callback list, and (while suspended) its
//! stored future. A [`TaskHandle`] is the caller-facing side: it can attach
//! completion callbacks and be awaited via [`TaskHandle::join`].
//!
//! Completion callbacks are routed through the soon queue without
//! exception: attaching a callback to an already-terminal task enqueues it
//! there immediately (one hop), never invokes it synchronously.

use crate::cx::Cx;
use crate::error::JoinError;
use crate::scheduler::{resume_task, SchedState, SoonCallback, TaskFuture};
use crate::types::{TaskId, TaskState};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tracing::trace;

/// Scheduler-owned task bookkeeping.
pub(crate) struct TaskRecord {
    pub(crate) id: TaskId,
    pub(crate) state: TaskState,
    pub(crate) future: Option<TaskFuture>,
    pub(crate) callbacks: SmallVec<[SoonCallback; 2]>,
    pub(crate) last_resumed_tick: Option<u64>,
}

impl TaskRecord {
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            state: TaskState::Created,
            future: None,
            callbacks: SmallVec::new(),
            last_resumed_tick: None,
        }
    }
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("callbacks", &self.callbacks.len())
            .field("last_resumed_tick", &self.last_resumed_tick)
            .finish()
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Arc<str> {
    if let Some(message) = payload.downcast_ref::<&str>() {
        Arc::from(*message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        Arc::from(message.as_str())
    } else {
        Arc::from("task panicked")
    }
}

/// Handle to a spawned task.
///
/// Cloneable; every clone observes the same task. The result type must be
/// `Clone` so that every current and future awaiter obtains the value
/// uniformly.
pub struct TaskHandle<T> {
    id: TaskId,
    shared: Weak<Mutex<SchedState>>,
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: Weak::clone(&self.shared),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

impl<T: Clone + Send + 'static> TaskHandle<T> {
    pub(crate) fn new(id: TaskId, shared: Weak<Mutex<SchedState>>, slot: Arc<Mutex<Option<T>>>) -> Self {
        Self { id, shared, slot }
    }

    /// The task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current state of the task, or `None` once the scheduler is gone.
    #[must_use]
    pub fn state(&self) -> Option<TaskState> {
        let shared = self.shared.upgrade()?;
        let st = shared.lock();
        st.tasks.get(&self.id).map(|record| record.state.clone())
    }

    /// True once the task is `Done` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state().is_some_and(|state| state.is_terminal())
    }

    /// Appends `callback` to the task's completion-callback list. If the
    /// task is already terminal, the callback goes straight onto the soon
    /// queue — still a one-hop deferral, never a synchronous call.
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        let Some(shared) = self.shared.upgrade() else {
            panic!("completion callback attached after scheduler teardown");
        };
        let mut st = shared.lock();
        let Some(record) = st.tasks.get_mut(&self.id) else {
            panic!("completion callback attached to unknown {}", self.id);
        };
        if record.state.is_terminal() {
            trace!(task = %self.id, "callback attached to terminal task, routed via soon queue");
            st.soon_queue.push_back(Box::new(callback));
        } else {
            record.callbacks.push(Box::new(callback));
        }
    }

    /// Awaits the task from within another task.
    ///
    /// If the task is already terminal the result is available without
    /// suspending. Otherwise the awaiting task suspends and is resumed by a
    /// completion callback during the soon drain of the tick after the
    /// awaited task completes.
    pub fn join(&self, cx: &Cx) -> JoinFuture<T> {
        JoinFuture {
            handle: self.clone(),
            waiter: cx.task_id(),
            registered: false,
        }
    }

    fn take_result(&self, state: &TaskState) -> Result<T, JoinError> {
        match state {
            TaskState::Done => {
                let value = self.slot.lock().clone();
                match value {
                    Some(value) => Ok(value),
                    // Done is set only after the result slot is filled.
                    None => panic!("{} is Done but its result slot is empty", self.id),
                }
            }
            TaskState::Failed(message) => Err(JoinError::Failed(Arc::clone(message))),
            other => panic!("{} result taken in non-terminal state {other:?}", self.id),
        }
    }
}

/// Future returned by [`TaskHandle::join`].
pub struct JoinFuture<T> {
    handle: TaskHandle<T>,
    waiter: TaskId,
    registered: bool,
}

impl<T: Clone + Send + 'static> Future for JoinFuture<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(shared) = this.handle.shared.upgrade() else {
            panic!("task joined after scheduler teardown");
        };

        let state = {
            let st = shared.lock();
            let Some(record) = st.tasks.get(&this.handle.id) else {
                panic!("{} joined but its record is gone", this.handle.id);
            };
            record.state.clone()
        };

        if state.is_terminal() {
            return Poll::Ready(this.handle.take_result(&state));
        }

        if !this.registered {
            this.registered = true;
            let waiter = this.waiter;
            let weak = Weak::clone(&this.handle.shared);
            trace!(task = %this.handle.id, waiter = %waiter, "awaiter suspended on completion");
            let mut st = shared.lock();
            let Some(record) = st.tasks.get_mut(&this.handle.id) else {
                panic!("{} joined but its record is gone", this.handle.id);
            };
            record.callbacks.push(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    resume_task(&shared, waiter);
                }
            }));
        }
        Poll::Pending
    }
}
