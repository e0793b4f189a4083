//! Mutation interception.
//!
//! Every call made against a wrapped state container is observed here,
//! given the next global sequence id and appended to the action that is
//! the active context at call time.

mod recording;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::history::{display_path, ActionId, MutationRecord, PathSegment};
use crate::recorder::Shared;

pub use recording::RecordingState;

/// Process-wide commit counter of one recorder.
#[derive(Debug)]
pub struct Sequencer {
    next: AtomicU64,
    suspended: AtomicUsize,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            suspended: AtomicUsize::new(0),
        }
    }

    /// Hand out the next sequence id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next call to [`Sequencer::next_id`] returns.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Stop sequencing and recording until the guard drops.
    pub fn suspend(&self) -> SuspendGuard<'_> {
        self.suspended.fetch_add(1, Ordering::SeqCst);
        SuspendGuard { sequencer: self }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst) > 0
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SuspendGuard<'a> {
    sequencer: &'a Sequencer,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.sequencer.suspended.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What happened to an observed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Appended to `action` with `sequence_id`.
    Recorded { action: ActionId, sequence_id: u64 },
    /// No action was active; the sequence id was consumed but nothing kept.
    Unattributed { sequence_id: u64 },
    /// Interception is suspended (a replay is running).
    Suspended,
    /// The recorder halted after a protocol violation.
    Halted,
}

#[derive(Clone)]
pub struct MutationInterceptor {
    shared: Arc<Shared>,
}

impl MutationInterceptor {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Observe one call to primitive `name`.
    ///
    /// `path` and `args` are copied, so callers may reuse their buffers.
    /// Never fails: problems halt the recorder instead of reaching the
    /// state container's caller.
    pub fn observe(&self, name: &str, path: &[PathSegment], args: &[Value]) -> Observation {
        let shared = &self.shared;
        if shared.sequencer.is_suspended() {
            return Observation::Suspended;
        }
        if shared.is_halted() {
            return Observation::Halted;
        }

        let Some(action) = shared.tracker.current_action() else {
            let sequence_id = shared.sequencer.next_id();
            tracing::trace!(
                recorder_id = %shared.id,
                sequence_id,
                primitive = name,
                "mutation outside any action"
            );
            return Observation::Unattributed { sequence_id };
        };

        // Sequence under the history lock so commit order and log order agree.
        let mut history = shared.history.lock();
        let sequence_id = shared.sequencer.next_id();
        let record = MutationRecord {
            name: name.to_string(),
            path: path.to_vec(),
            args: args.to_vec(),
            sequence_id,
        };
        match history.record_mutation(action, record) {
            Ok(()) => {
                drop(history);
                if shared.config.log_mutations {
                    tracing::trace!(
                        recorder_id = %shared.id,
                        action_id = %action,
                        sequence_id,
                        primitive = name,
                        path = %display_path(path),
                        "mutation recorded"
                    );
                }
                Observation::Recorded {
                    action,
                    sequence_id,
                }
            }
            Err(err) => {
                drop(history);
                shared.halt(&err);
                Observation::Halted
            }
        }
    }

    pub fn current_action(&self) -> Option<ActionId> {
        self.shared.tracker.current_action()
    }
}
