//! The recorder: lifecycle hooks for the host runtime plus the read side.
//!
//! A [`Recorder`] is an explicitly constructed, cheaply cloneable handle.
//! The host calls its hooks as signals and actions start and end, wraps its
//! state container with [`Recorder::wrap_state`], and queries history or
//! remembers past state through the same handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::RecorderConfig;
use crate::context::ContextTracker;
use crate::error::{RecorderError, Result};
use crate::history::{
    ActionId, BranchPath, HistoryStore, MutationRecord, SignalId, SignalInput, SignalSnapshot,
    StoreRef,
};
use crate::interceptor::{MutationInterceptor, RecordingState, Sequencer};
use crate::replay::{self, ReplayReport};
use crate::state::StateContainer;

/// Current mode of a recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Recording,
    /// A replay is running.
    Remembering,
    /// A protocol violation stopped history capture.
    Halted,
}

pub(crate) struct Shared {
    pub(crate) id: Uuid,
    pub(crate) config: RecorderConfig,
    pub(crate) tracker: ContextTracker,
    pub(crate) sequencer: Sequencer,
    pub(crate) history: Mutex<HistoryStore>,
    pub(crate) remembering: AtomicBool,
    pub(crate) current_index: Mutex<Option<SignalId>>,
    halted: AtomicBool,
}

impl Shared {
    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Stop history capture after a fatal error.
    pub(crate) fn halt(&self, error: &RecorderError) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            tracing::error!(
                recorder_id = %self.id,
                label = self.config.label.as_deref().unwrap_or(""),
                error = %error,
                "history capture halted"
            );
        }
    }
}

#[derive(Clone)]
pub struct Recorder {
    shared: Arc<Shared>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        let history = HistoryStore::new(config.ignored_input_fields.clone());
        let shared = Shared {
            id: Uuid::new_v4(),
            config,
            tracker: ContextTracker::new(),
            sequencer: Sequencer::new(),
            history: Mutex::new(history),
            remembering: AtomicBool::new(false),
            current_index: Mutex::new(None),
            halted: AtomicBool::new(false),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.shared.config
    }

    pub fn tracker(&self) -> &ContextTracker {
        &self.shared.tracker
    }

    pub fn interceptor(&self) -> MutationInterceptor {
        MutationInterceptor::new(self.shared.clone())
    }

    /// Wrap a state container so calls made against it are recorded.
    pub fn wrap_state<S: StateContainer>(&self, state: S) -> RecordingState<S> {
        RecordingState::new(state, self.interceptor())
    }

    pub fn status(&self) -> RecorderStatus {
        if self.shared.is_halted() {
            RecorderStatus::Halted
        } else if self.is_remembering() {
            RecorderStatus::Remembering
        } else {
            RecorderStatus::Recording
        }
    }

    pub fn is_halted(&self) -> bool {
        self.shared.is_halted()
    }

    /// Run a store operation, halting on protocol violations.
    fn hook<T>(&self, op: impl FnOnce(&mut HistoryStore) -> Result<T>) -> Result<T> {
        if self.shared.is_halted() {
            return Err(RecorderError::Halted);
        }
        let result = op(&mut self.shared.history.lock());
        if let Err(err) = &result {
            if err.is_fatal() {
                self.shared.halt(err);
            }
        }
        result
    }

    /// Signal-start hook.
    ///
    /// A signal started while the calling thread is inside an action is
    /// linked under that action.
    pub fn begin_signal(&self, name: &str, input: SignalInput) -> Result<SignalId> {
        let parent = self.shared.tracker.current_action();
        let id = self.hook(|history| {
            if let Some(parent) = parent {
                if history.action(parent).is_none() {
                    return Err(RecorderError::ProtocolViolation(format!(
                        "signal {name} started inside unknown action {parent}"
                    )));
                }
            }
            let id = history.begin_signal(name, &input);
            if let Some(parent) = parent {
                history.attach_nested_signal(parent, id)?;
            }
            Ok(id)
        })?;
        tracing::debug!(
            recorder_id = %self.shared.id,
            signal_id = id,
            signal = name,
            parent = ?parent,
            "signal started"
        );
        Ok(id)
    }

    /// Signal-end hook.
    pub fn end_signal(&self, id: SignalId) -> Result<()> {
        self.hook(|history| history.end_signal(id))?;
        tracing::debug!(recorder_id = %self.shared.id, signal_id = id, "signal ended");
        Ok(())
    }

    /// Action-start hook. `path` is the action's position in the chain.
    pub fn begin_action(
        &self,
        signal: SignalId,
        path: &BranchPath,
        name: &str,
        is_async: bool,
    ) -> Result<ActionId> {
        let id = self.hook(|history| history.begin_action(signal, path, name, is_async))?;
        tracing::debug!(
            recorder_id = %self.shared.id,
            signal_id = signal,
            action_id = %id,
            action = name,
            is_async,
            path = %path,
            "action started"
        );
        Ok(id)
    }

    /// Action-end hook (synchronous return, or resume of an async action).
    pub fn end_action(&self, id: ActionId) -> Result<()> {
        self.hook(|history| history.end_action(id))?;
        tracing::debug!(recorder_id = %self.shared.id, action_id = %id, "action ended");
        Ok(())
    }

    /// Link `signal` under the action that triggered it.
    pub fn attach_nested_signal(&self, action: ActionId, signal: SignalId) -> Result<()> {
        self.hook(|history| history.attach_nested_signal(action, signal))
    }

    /// Embed a reference to `nested` in the chain of `owner`.
    pub fn place_signal(&self, owner: SignalId, path: &BranchPath, nested: SignalId) -> Result<()> {
        self.hook(|history| history.place_signal(owner, path, nested))
    }

    fn store_ref(&self) -> StoreRef {
        StoreRef::new(self.shared.id, Arc::downgrade(&self.shared))
    }

    /// All signals, oldest first.
    pub fn signals(&self) -> Vec<SignalSnapshot> {
        let history = self.shared.history.lock();
        (0..history.len())
            .filter_map(|id| history.snapshot(id, self.store_ref()))
            .collect()
    }

    pub fn signal(&self, id: SignalId) -> Option<SignalSnapshot> {
        self.shared.history.lock().snapshot(id, self.store_ref())
    }

    pub fn len(&self) -> usize {
        self.shared.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while any async action is started but not yet resumed.
    pub fn is_executing_async(&self) -> bool {
        self.shared.history.lock().is_executing_async()
    }

    pub fn outstanding_async(&self) -> usize {
        self.shared.history.lock().outstanding_async()
    }

    /// Mutations of signals `0..=up_to` in commit order.
    pub fn flatten(&self, up_to: SignalId) -> Result<Vec<MutationRecord>> {
        self.shared.history.lock().flatten(up_to)
    }

    /// Reset `state` and replay history up to and including `signal_id`.
    pub fn remember<S: StateContainer + ?Sized>(
        &self,
        signal_id: SignalId,
        state: &mut S,
    ) -> Result<ReplayReport> {
        replay::remember(&self.shared, signal_id, state)
    }

    /// Signal id last remembered, if any.
    pub fn current_index(&self) -> Option<SignalId> {
        *self.shared.current_index.lock()
    }

    pub fn is_remembering(&self) -> bool {
        self.shared.remembering.load(Ordering::SeqCst)
    }

    /// Drop all recorded signals. Refused while signals or async actions
    /// are still running.
    pub fn clear(&self) -> Result<()> {
        let mut history = self.shared.history.lock();
        let outstanding = history.outstanding_async();
        if outstanding > 0 {
            return Err(RecorderError::AsyncInFlight(outstanding));
        }
        let running = history.running_signals();
        if running > 0 {
            return Err(RecorderError::SignalsInFlight(running));
        }
        history.clear();
        *self.shared.current_index.lock() = None;
        tracing::debug!(recorder_id = %self.shared.id, "history cleared");
        Ok(())
    }

    /// Pretty JSON export of every signal, for a debugging UI.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let export = serde_json::json!({
            "recorder_id": self.shared.id,
            "label": self.shared.config.label,
            "signals": self.signals(),
        });
        serde_json::to_string_pretty(&export)
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("id", &self.shared.id)
            .field("label", &self.shared.config.label)
            .field("status", &self.status())
            .finish()
    }
}
