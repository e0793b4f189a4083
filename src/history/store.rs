use chrono::Utc;

use super::branch::{self, BranchNode, BranchPath};
use super::record::{ActionId, ActionRecord, MutationRecord, SignalId, SignalInput, SignalRecord};
use crate::error::{RecorderError, Result};

/// Position of one committed mutation inside the arena.
#[derive(Debug, Clone, Copy)]
struct Commit {
    sequence_id: u64,
    signal: SignalId,
    action: ActionId,
    slot: usize,
}

/// Append-only log of signal executions.
///
/// Holds two views over the same records: the per-signal branch tree used
/// for display, and a flat commit log ordered by sequence id used for
/// replay. Signals and actions live in arenas and refer to each other by
/// index only.
#[derive(Debug, Default)]
pub struct HistoryStore {
    signals: Vec<SignalRecord>,
    actions: Vec<ActionRecord>,
    commits: Vec<Commit>,
    /// Open actions per signal, indexed like `signals`.
    open_actions: Vec<usize>,
    /// Id of `actions[0]`. Grows on `clear` so ids are never reused.
    action_base: usize,
    outstanding_async: usize,
    ignored_input_fields: Vec<String>,
}

fn violation(message: impl Into<String>) -> RecorderError {
    RecorderError::ProtocolViolation(message.into())
}

impl HistoryStore {
    pub fn new(ignored_input_fields: Vec<String>) -> Self {
        Self {
            ignored_input_fields,
            ..Self::default()
        }
    }

    /// Open a new signal record and return its id.
    pub fn begin_signal(&mut self, name: &str, input: &SignalInput) -> SignalId {
        let id = self.signals.len();
        self.signals.push(SignalRecord {
            id,
            name: name.to_string(),
            input: input.explicit_fields(&self.ignored_input_fields),
            branches: Vec::new(),
            parent: None,
            started_at: Utc::now(),
            ended_at: None,
        });
        self.open_actions.push(0);
        id
    }

    pub fn end_signal(&mut self, id: SignalId) -> Result<()> {
        let signal = self
            .signals
            .get_mut(id)
            .ok_or_else(|| violation(format!("end_signal for unknown signal {id}")))?;
        if signal.ended_at.is_some() {
            return Err(violation(format!("signal {id} ({}) ended twice", signal.name)));
        }
        let open = self.open_actions[id];
        if open > 0 {
            return Err(violation(format!(
                "signal {id} ({}) ended with {open} action(s) still open",
                signal.name
            )));
        }
        signal.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Open an action record at `path` in the tree of signal `signal`.
    pub fn begin_action(
        &mut self,
        signal: SignalId,
        path: &BranchPath,
        name: &str,
        is_async: bool,
    ) -> Result<ActionId> {
        let id = ActionId(self.action_base + self.actions.len());
        let record = self
            .signals
            .get_mut(signal)
            .ok_or_else(|| violation(format!("action {name} started for unknown signal {signal}")))?;
        if record.ended_at.is_some() {
            return Err(violation(format!(
                "action {name} started after signal {signal} ({}) ended",
                record.name
            )));
        }
        branch::place(&mut record.branches, path, BranchNode::Action(id))
            .map_err(|reason| violation(format!("action {name} in signal {signal}: {reason}")))?;

        self.actions.push(ActionRecord {
            id,
            signal,
            name: name.to_string(),
            is_async,
            mutations: Vec::new(),
            signals: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        });
        self.open_actions[signal] += 1;
        if is_async {
            self.outstanding_async += 1;
        }
        Ok(id)
    }

    pub fn end_action(&mut self, id: ActionId) -> Result<()> {
        let action = self
            .action_slot(id)
            .and_then(|slot| self.actions.get_mut(slot))
            .ok_or_else(|| violation(format!("end_action for unknown action {id}")))?;
        if action.ended_at.is_some() {
            return Err(violation(format!("action {id} ({}) ended twice", action.name)));
        }
        action.ended_at = Some(Utc::now());
        let signal = action.signal;
        if action.is_async {
            self.outstanding_async = self
                .outstanding_async
                .checked_sub(1)
                .ok_or_else(|| violation("outstanding async counter underflow"))?;
        }
        self.open_actions[signal] = self.open_actions[signal].saturating_sub(1);
        Ok(())
    }

    /// Link `signal` under the action that triggered it.
    pub fn attach_nested_signal(&mut self, action: ActionId, signal: SignalId) -> Result<()> {
        if signal >= self.signals.len() {
            return Err(violation(format!("nested signal {signal} is unknown")));
        }
        let record = self
            .action_slot(action)
            .and_then(|slot| self.actions.get_mut(slot))
            .ok_or_else(|| violation(format!("nested signal {signal} under unknown action {action}")))?;
        if !record.signals.contains(&signal) {
            record.signals.push(signal);
        }
        self.signals[signal].parent = Some(action);
        Ok(())
    }

    /// Embed a reference to `nested` at `path` in the tree of `owner`.
    pub fn place_signal(&mut self, owner: SignalId, path: &BranchPath, nested: SignalId) -> Result<()> {
        if nested >= self.signals.len() {
            return Err(violation(format!("embedded signal {nested} is unknown")));
        }
        let record = self
            .signals
            .get_mut(owner)
            .ok_or_else(|| violation(format!("embedding into unknown signal {owner}")))?;
        branch::place(&mut record.branches, path, BranchNode::Signal(nested))
            .map_err(|reason| violation(format!("signal {nested} in signal {owner}: {reason}")))
    }

    /// Append a committed mutation to `action`.
    ///
    /// Sequence ids must arrive strictly increasing.
    pub fn record_mutation(&mut self, action: ActionId, mutation: MutationRecord) -> Result<()> {
        if let Some(last) = self.commits.last() {
            if mutation.sequence_id <= last.sequence_id {
                return Err(violation(format!(
                    "sequence id {} is not after {}",
                    mutation.sequence_id, last.sequence_id
                )));
            }
        }
        let record = self
            .action_slot(action)
            .and_then(|slot| self.actions.get_mut(slot))
            .ok_or_else(|| violation(format!("mutation {} for unknown action {action}", mutation.name)))?;
        self.commits.push(Commit {
            sequence_id: mutation.sequence_id,
            signal: record.signal,
            action,
            slot: record.mutations.len(),
        });
        record.mutations.push(mutation);
        Ok(())
    }

    pub fn signals(&self) -> &[SignalRecord] {
        &self.signals
    }

    pub fn signal(&self, id: SignalId) -> Option<&SignalRecord> {
        self.signals.get(id)
    }

    pub fn action(&self, id: ActionId) -> Option<&ActionRecord> {
        self.action_slot(id).and_then(|slot| self.actions.get(slot))
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn outstanding_async(&self) -> usize {
        self.outstanding_async
    }

    pub fn is_executing_async(&self) -> bool {
        self.outstanding_async > 0
    }

    /// Number of signals that have not ended yet.
    pub fn running_signals(&self) -> usize {
        self.signals.iter().filter(|s| s.is_running()).count()
    }

    /// Every mutation of signals `0..=up_to`, in sequence order.
    pub fn flatten(&self, up_to: SignalId) -> Result<Vec<MutationRecord>> {
        if up_to >= self.signals.len() {
            return Err(RecorderError::OutOfRange {
                signal_id: up_to,
                len: self.signals.len(),
            });
        }
        let mutations: Vec<MutationRecord> = self
            .commits
            .iter()
            .filter(|commit| commit.signal <= up_to)
            .map(|commit| {
                self.actions[commit.action.0 - self.action_base].mutations[commit.slot].clone()
            })
            .collect();
        debug_assert!(mutations
            .windows(2)
            .all(|w| w[0].sequence_id < w[1].sequence_id));
        Ok(mutations)
    }

    /// Drop every record. Callers check that nothing is running.
    ///
    /// Signal ids restart at 0; action ids keep counting so a stale handle
    /// from before the clear can never address a new action.
    pub fn clear(&mut self) {
        self.action_base += self.actions.len();
        self.signals.clear();
        self.actions.clear();
        self.commits.clear();
        self.open_actions.clear();
        self.outstanding_async = 0;
    }

    fn action_slot(&self, id: ActionId) -> Option<usize> {
        id.0.checked_sub(self.action_base)
            .filter(|slot| *slot < self.actions.len())
    }
}
