use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use super::runtime::ActionContext;

pub type SyncAction = Arc<dyn Fn(&mut ActionContext) + Send + Sync>;
pub type AsyncAction =
    Arc<dyn Fn(ActionContext) -> BoxFuture<'static, Map<String, Value>> + Send + Sync>;

/// One entry of a signal chain.
#[derive(Clone)]
pub enum Step {
    /// Runs to completion without suspending.
    Action { name: String, run: SyncAction },
    /// Suspends until its future resolves; the resolved map is merged into
    /// the signal's payload for later steps.
    Async { name: String, run: AsyncAction },
    /// Member chains run concurrently; the step completes when all do.
    Parallel(Vec<Vec<Step>>),
    /// A nested sub-chain.
    Sequence(Vec<Step>),
}

impl Step {
    pub fn action(
        name: impl Into<String>,
        run: impl Fn(&mut ActionContext) + Send + Sync + 'static,
    ) -> Self {
        Step::Action {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    pub fn async_action<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Map<String, Value>> + Send + 'static,
    {
        Step::Async {
            name: name.into(),
            run: Arc::new(move |ctx| run(ctx).boxed()),
        }
    }

    /// An action that does nothing.
    pub fn noop(name: impl Into<String>) -> Self {
        Self::action(name, |_| {})
    }

    pub fn parallel(members: Vec<Vec<Step>>) -> Self {
        Step::Parallel(members)
    }

    pub fn sequence(steps: Vec<Step>) -> Self {
        Step::Sequence(steps)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Step::Action { name, .. } | Step::Async { name, .. } => Some(name),
            Step::Parallel(_) | Step::Sequence(_) => None,
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Action { name, .. } => write!(f, "Action({name})"),
            Step::Async { name, .. } => write!(f, "Async({name})"),
            Step::Parallel(members) => f.debug_tuple("Parallel").field(members).finish(),
            Step::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
        }
    }
}
