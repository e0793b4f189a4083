use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::ContextTracker;
use crate::history::ActionId;

/// A future whose polls run inside an action's context.
///
/// Each poll enters the context and leaves it again before returning, so
/// whatever runs between two polls keeps its own attribution.
pub struct Attributed<F> {
    tracker: ContextTracker,
    action: ActionId,
    inner: Pin<Box<F>>,
}

impl<F> Attributed<F> {
    pub(super) fn new(tracker: ContextTracker, action: ActionId, inner: F) -> Self {
        Self {
            tracker,
            action,
            inner: Box::pin(inner),
        }
    }

    pub fn action(&self) -> ActionId {
        self.action
    }
}

impl<F: Future> Future for Attributed<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let _guard = this.tracker.enter(this.action);
        this.inner.as_mut().poll(cx)
    }
}
