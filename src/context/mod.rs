//! Execution context tracking.
//!
//! Answers "which action is a mutation made right now attributed to". The
//! context is kept per thread as a stack of frames, and continuations are
//! bound to an action explicitly ([`ContextTracker::bind`],
//! [`ContextTracker::instrument`]) so an async action that resumes after
//! other signals ran still attributes to itself.

mod future;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::RecorderError;
use crate::history::ActionId;

pub use future::Attributed;

/// Returned by [`ContextTracker::enter_action`]; pass it back to exit.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a context handle must be passed to exit_action"]
pub struct ContextHandle {
    id: u64,
    action: ActionId,
}

impl ContextHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn action(&self) -> ActionId {
        self.action
    }
}

/// Outcome of [`ContextTracker::exit_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextExit {
    /// The handle was the active context; the previous one is active again.
    Restored,
    /// The handle was no longer active. Nothing else was touched.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    handle: u64,
    action: ActionId,
}

#[derive(Debug, Default)]
struct TrackerState {
    next_handle: u64,
    stacks: HashMap<ThreadId, Vec<Frame>>,
    stale_exits: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ContextTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `action` the active context for the calling thread.
    pub fn enter_action(&self, action: ActionId) -> ContextHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let id = state.next_handle;
        state
            .stacks
            .entry(thread::current().id())
            .or_default()
            .push(Frame { handle: id, action });
        ContextHandle { id, action }
    }

    /// Restore the context that was active before `handle` was entered.
    ///
    /// A handle that is not the active context is logged and ignored. The
    /// stack is left as it was, so exiting the frames above a buried handle
    /// still restores the context they were entered over.
    pub fn exit_action(&self, handle: ContextHandle) -> ContextExit {
        let mut state = self.state.lock();
        let thread_id = thread::current().id();
        let Some(stack) = state.stacks.get_mut(&thread_id) else {
            state.stale_exits += 1;
            drop(state);
            log_stale(&handle, "no context is active on this thread");
            return ContextExit::Stale;
        };

        match stack.iter().rposition(|frame| frame.handle == handle.id) {
            Some(pos) if pos + 1 == stack.len() => {
                stack.pop();
                if stack.is_empty() {
                    state.stacks.remove(&thread_id);
                }
                ContextExit::Restored
            }
            Some(_) => {
                state.stale_exits += 1;
                drop(state);
                log_stale(&handle, "another context became active since");
                ContextExit::Stale
            }
            None => {
                state.stale_exits += 1;
                drop(state);
                log_stale(&handle, "context already exited");
                ContextExit::Stale
            }
        }
    }

    /// The attribution target for a mutation made on this thread right now.
    pub fn current_action(&self) -> Option<ActionId> {
        let state = self.state.lock();
        state
            .stacks
            .get(&thread::current().id())
            .and_then(|stack| stack.last())
            .map(|frame| frame.action)
    }

    /// Nesting depth on the calling thread.
    pub fn depth(&self) -> usize {
        let state = self.state.lock();
        state
            .stacks
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }

    /// Number of stale exits seen so far.
    pub fn stale_exits(&self) -> u64 {
        self.state.lock().stale_exits
    }

    /// Enter `action` until the returned guard is dropped.
    pub fn enter(&self, action: ActionId) -> ContextGuard {
        ContextGuard {
            tracker: self.clone(),
            handle: Some(self.enter_action(action)),
        }
    }

    /// Run `f` with `action` as the active context.
    pub fn in_action<R>(&self, action: ActionId, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter(action);
        f()
    }

    /// Bind a continuation to `action`: whenever it is eventually called,
    /// mutations it makes attribute to `action`.
    pub fn bind<R>(
        &self,
        action: ActionId,
        f: impl FnOnce() -> R + Send + 'static,
    ) -> impl FnOnce() -> R + Send + 'static {
        let tracker = self.clone();
        move || tracker.in_action(action, f)
    }

    /// Attribute every poll of `future` to `action`.
    pub fn instrument<F: std::future::Future>(&self, action: ActionId, future: F) -> Attributed<F> {
        Attributed::new(self.clone(), action, future)
    }
}

fn log_stale(handle: &ContextHandle, reason: &str) {
    tracing::warn!(
        error = %RecorderError::StaleContextExit(handle.id),
        action_id = %handle.action,
        reason,
        "stale context exit ignored"
    );
}

/// Exits its context on drop.
#[derive(Debug)]
pub struct ContextGuard {
    tracker: ContextTracker,
    handle: Option<ContextHandle>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tracker.exit_action(handle);
        }
    }
}
