//! Replay engine: rebuild state as of a past signal.
//!
//! The state container is reset and the flat mutation log of signals
//! `0..=signal_id` is applied in sequence-id order. Interception is
//! suspended for the whole replay, so nothing is recorded and the sequence
//! counter does not move.

use std::sync::atomic::Ordering;

use crate::error::{RecorderError, Result};
use crate::history::{display_path, SignalId};
use crate::recorder::Shared;
use crate::state::StateContainer;

/// Summary of one replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub signal_id: SignalId,
    pub applied: usize,
}

pub(crate) fn remember<S: StateContainer + ?Sized>(
    shared: &Shared,
    signal_id: SignalId,
    state: &mut S,
) -> Result<ReplayReport> {
    // Out-of-range ids fail here, before the state is touched.
    let mutations = shared.history.lock().flatten(signal_id)?;

    let _suspended = shared.sequencer.suspend();
    let _remembering = RememberingFlag::raise(shared);

    state.reset();
    for mutation in &mutations {
        if let Err(err) = state.apply(&mutation.name, &mutation.path, &mutation.args) {
            tracing::error!(
                recorder_id = %shared.id,
                signal_id,
                sequence_id = mutation.sequence_id,
                primitive = %mutation.name,
                path = %display_path(&mutation.path),
                error = %err,
                "replay stopped at a rejected mutation"
            );
            return Err(RecorderError::Mutation(err));
        }
    }

    *shared.current_index.lock() = Some(signal_id);
    tracing::debug!(
        recorder_id = %shared.id,
        signal_id,
        applied = mutations.len(),
        "remembered signal"
    );
    Ok(ReplayReport {
        signal_id,
        applied: mutations.len(),
    })
}

struct RememberingFlag<'a> {
    shared: &'a Shared,
}

impl<'a> RememberingFlag<'a> {
    fn raise(shared: &'a Shared) -> Self {
        shared.remembering.store(true, Ordering::SeqCst);
        Self { shared }
    }
}

impl Drop for RememberingFlag<'_> {
    fn drop(&mut self) {
        self.shared.remembering.store(false, Ordering::SeqCst);
    }
}
