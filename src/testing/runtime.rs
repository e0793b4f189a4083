use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use super::chain::Step;
use crate::error::{MutationError, RecorderError};
use crate::history::{ActionId, BranchPath, PathSegment, SignalId, SignalInput};
use crate::interceptor::RecordingState;
use crate::recorder::Recorder;
use crate::replay::ReplayReport;
use crate::state::{JsonState, StateContainerExt};

pub type SharedState = Arc<Mutex<RecordingState<JsonState>>>;
type Payload = Arc<Mutex<Map<String, Value>>>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Unknown signal: {0}")]
    UnknownSignal(String),
}

/// Minimal signal runtime that reports to a [`Recorder`].
///
/// Chains are walked step by step; parallel groups run their member chains
/// concurrently and async actions suspend on their futures. Recorder hook
/// failures are logged and ignored so the runtime keeps going when the
/// recorder halts.
#[derive(Clone)]
pub struct MockRuntime {
    recorder: Recorder,
    state: SharedState,
    chains: Arc<Mutex<HashMap<String, Arc<Vec<Step>>>>>,
    services: Arc<Mutex<Map<String, Value>>>,
}

impl MockRuntime {
    pub fn new(recorder: Recorder, initial_state: Value) -> Self {
        let state = recorder.wrap_state(JsonState::new(initial_state));
        Self {
            recorder,
            state: Arc::new(Mutex::new(state)),
            chains: Arc::new(Mutex::new(HashMap::new())),
            services: Arc::new(Mutex::new(Map::new())),
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn state_handle(&self) -> SharedState {
        self.state.clone()
    }

    /// Current state tree.
    pub fn state(&self) -> Value {
        self.state.lock().inner().get().clone()
    }

    pub fn add_signal(&self, name: impl Into<String>, chain: Vec<Step>) {
        self.chains.lock().insert(name.into(), Arc::new(chain));
    }

    /// Register a service handed to every signal as a defaulted input field.
    pub fn add_service(&self, name: impl Into<String>, value: Value) {
        self.services.lock().insert(name.into(), value);
    }

    /// Run a signal to completion.
    pub async fn run(&self, name: &str, input: Value) -> Result<Option<SignalId>, RuntimeError> {
        let parent = self.recorder.tracker().current_action();
        self.run_signal(name.to_string(), input, parent).await
    }

    /// Spawn a signal on the current runtime. It starts when the scheduler
    /// first polls it; an action active at trigger time becomes its parent.
    pub fn trigger(
        &self,
        name: &str,
        input: Value,
    ) -> JoinHandle<Result<Option<SignalId>, RuntimeError>> {
        let parent = self.recorder.tracker().current_action();
        tokio::spawn(self.run_signal(name.to_string(), input, parent))
    }

    /// Replay history into this runtime's state.
    pub fn remember(&self, signal_id: SignalId) -> Result<ReplayReport, RecorderError> {
        let mut state = self.state.lock();
        self.recorder.remember(signal_id, &mut *state)
    }

    fn hook<T>(&self, hook: &str, result: Result<T, RecorderError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(hook, error = %err, "recorder hook failed; continuing");
                None
            }
        }
    }

    fn run_signal(
        &self,
        name: String,
        input: Value,
        parent: Option<ActionId>,
    ) -> BoxFuture<'static, Result<Option<SignalId>, RuntimeError>> {
        let runtime = self.clone();
        async move {
            let chain = runtime
                .chains
                .lock()
                .get(&name)
                .cloned()
                .ok_or_else(|| RuntimeError::UnknownSignal(name.clone()))?;

            let mut signal_input = SignalInput::from_value(input);
            for (key, value) in runtime.services.lock().iter() {
                if !signal_input.fields.contains_key(key) {
                    signal_input = signal_input.with_default(key.clone(), value.clone());
                }
            }
            let payload: Payload = Arc::new(Mutex::new(signal_input.fields.clone()));

            let signal = runtime.hook(
                "signal-start",
                runtime.recorder.begin_signal(&name, signal_input),
            );
            if let (Some(parent), Some(signal)) = (parent, signal) {
                runtime.hook(
                    "nested-signal",
                    runtime.recorder.attach_nested_signal(parent, signal),
                );
            }

            runtime
                .run_chain(signal, chain.as_ref().clone(), BranchPath::root(), payload)
                .await;

            if let Some(signal) = signal {
                runtime.hook("signal-end", runtime.recorder.end_signal(signal));
            }
            Ok(signal)
        }
        .boxed()
    }

    fn run_chain(
        &self,
        signal: Option<SignalId>,
        chain: Vec<Step>,
        base: BranchPath,
        payload: Payload,
    ) -> BoxFuture<'static, ()> {
        let runtime = self.clone();
        async move {
            for (index, step) in chain.into_iter().enumerate() {
                let path = base.clone().step(index);
                match step {
                    Step::Action { name, run } => {
                        let action = runtime.begin_action(signal, &path, &name, false);
                        let mut ctx = runtime.context(action, &payload);
                        match action {
                            Some(id) => runtime.recorder.tracker().in_action(id, || run(&mut ctx)),
                            None => run(&mut ctx),
                        }
                        runtime.end_action(action);
                        payload.lock().extend(ctx.take_output());
                    }
                    Step::Async { name, run } => {
                        let action = runtime.begin_action(signal, &path, &name, true);
                        let ctx = runtime.context(action, &payload);
                        let output = match action {
                            Some(id) => runtime.recorder.tracker().instrument(id, run(ctx)).await,
                            None => run(ctx).await,
                        };
                        runtime.end_action(action);
                        payload.lock().extend(output);
                    }
                    Step::Parallel(members) => {
                        let branches: Vec<_> = members
                            .into_iter()
                            .enumerate()
                            .map(|(member, chain)| {
                                runtime.run_chain(
                                    signal,
                                    chain,
                                    path.clone().member(member),
                                    payload.clone(),
                                )
                            })
                            .collect();
                        join_all(branches).await;
                    }
                    Step::Sequence(steps) => {
                        runtime
                            .run_chain(signal, steps, path, payload.clone())
                            .await;
                    }
                }
            }
        }
        .boxed()
    }

    fn begin_action(
        &self,
        signal: Option<SignalId>,
        path: &BranchPath,
        name: &str,
        is_async: bool,
    ) -> Option<ActionId> {
        let signal = signal?;
        self.hook(
            "action-start",
            self.recorder.begin_action(signal, path, name, is_async),
        )
    }

    fn end_action(&self, action: Option<ActionId>) {
        if let Some(action) = action {
            self.hook("action-end", self.recorder.end_action(action));
        }
    }

    fn context(&self, action: Option<ActionId>, payload: &Payload) -> ActionContext {
        ActionContext {
            input: payload.lock().clone(),
            action,
            runtime: self.clone(),
            output: Map::new(),
        }
    }
}

/// What an action sees while it runs.
#[derive(Clone)]
pub struct ActionContext {
    /// Signal input plus outputs of earlier steps.
    pub input: Map<String, Value>,
    action: Option<ActionId>,
    runtime: MockRuntime,
    output: Map<String, Value>,
}

impl ActionContext {
    pub fn action(&self) -> Option<ActionId> {
        self.action
    }

    pub fn recorder(&self) -> &Recorder {
        &self.runtime.recorder
    }

    pub fn runtime(&self) -> &MockRuntime {
        &self.runtime
    }

    pub fn set<P: Into<PathSegment>>(
        &self,
        path: impl IntoIterator<Item = P>,
        value: Value,
    ) -> Result<(), MutationError> {
        self.runtime.state.lock().set(path, value)
    }

    pub fn merge<P: Into<PathSegment>>(
        &self,
        path: impl IntoIterator<Item = P>,
        value: Value,
    ) -> Result<(), MutationError> {
        self.runtime.state.lock().merge(path, value)
    }

    pub fn push<P: Into<PathSegment>>(
        &self,
        path: impl IntoIterator<Item = P>,
        value: Value,
    ) -> Result<(), MutationError> {
        self.runtime.state.lock().push(path, value)
    }

    pub fn unset<P: Into<PathSegment>>(
        &self,
        path: impl IntoIterator<Item = P>,
    ) -> Result<(), MutationError> {
        self.runtime.state.lock().unset(path)
    }

    /// Pass a value to later steps (sync actions only; async actions
    /// return their output).
    pub fn output(&mut self, key: impl Into<String>, value: Value) {
        self.output.insert(key.into(), value);
    }

    /// Trigger another signal from inside this action.
    pub fn trigger(
        &self,
        name: &str,
        input: Value,
    ) -> JoinHandle<Result<Option<SignalId>, RuntimeError>> {
        self.runtime.trigger(name, input)
    }

    fn take_output(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.output)
    }
}
