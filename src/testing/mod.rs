//! A small signal runtime for driving a [`Recorder`](crate::Recorder) in
//! tests and demos, plus helpers for steering interleavings.

mod chain;
mod runtime;

pub use chain::{AsyncAction, Step, SyncAction};
pub use runtime::{ActionContext, MockRuntime, RuntimeError, SharedState};

use tokio::sync::watch;

/// A one-shot barrier that async actions can wait on.
#[derive(Clone)]
pub struct Gate {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the gate is open.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of the gate.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// Yield to the scheduler a few times so spawned signals make progress.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
