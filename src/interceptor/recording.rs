use serde_json::Value;

use super::{MutationInterceptor, Observation};
use crate::error::MutationError;
use crate::history::PathSegment;
use crate::state::StateContainer;

/// A state container whose primitives are observed by the recorder.
///
/// Calls are forwarded to the inner container unchanged; only calls the
/// inner container accepted are recorded, so a replay never trips over a
/// primitive that failed the first time.
pub struct RecordingState<S> {
    inner: S,
    interceptor: MutationInterceptor,
    last_observation: Option<Observation>,
}

impl<S: StateContainer> RecordingState<S> {
    pub fn new(inner: S, interceptor: MutationInterceptor) -> Self {
        Self {
            inner,
            interceptor,
            last_observation: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutate the inner container without recording.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// How the most recent call was observed.
    pub fn last_observation(&self) -> Option<Observation> {
        self.last_observation
    }
}

impl<S: StateContainer> StateContainer for RecordingState<S> {
    fn apply(
        &mut self,
        name: &str,
        path: &[PathSegment],
        args: &[Value],
    ) -> Result<(), MutationError> {
        self.inner.apply(name, path, args)?;
        self.last_observation = Some(self.interceptor.observe(name, path, args));
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
