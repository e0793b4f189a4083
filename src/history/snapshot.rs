//! Resolved, read-only copies of history records.
//!
//! The store keeps ids in its branch trees; a snapshot inlines the action
//! records so callers (tests, a debugging UI) can walk the tree without
//! holding the store lock.

use std::fmt;
use std::sync::Weak;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::branch::BranchNode;
use super::record::{ActionId, ActionRecord, MutationRecord, SignalId, SignalRecord};
use super::store::HistoryStore;
use crate::recorder::{Recorder, Shared};

/// Weak back-reference from a snapshot to the recorder that owns it.
#[derive(Clone, Default)]
pub struct StoreRef {
    recorder_id: Option<Uuid>,
    shared: Weak<Shared>,
}

impl StoreRef {
    pub(crate) fn new(recorder_id: Uuid, shared: Weak<Shared>) -> Self {
        Self {
            recorder_id: Some(recorder_id),
            shared,
        }
    }

    pub fn recorder_id(&self) -> Option<Uuid> {
        self.recorder_id
    }

    /// The owning recorder, if it is still alive.
    pub fn recorder(&self) -> Option<Recorder> {
        self.shared.upgrade().map(Recorder::from_shared)
    }

    /// Resolve a signal id (e.g. a nested-signal back-link) lazily.
    pub fn signal(&self, id: SignalId) -> Option<SignalSnapshot> {
        self.recorder()?.signal(id)
    }
}

impl fmt::Debug for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRef")
            .field("recorder_id", &self.recorder_id)
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BranchSnapshot {
    Action(ActionRecord),
    Sequential(Vec<BranchSnapshot>),
    Parallel(Vec<Vec<BranchSnapshot>>),
    Signal(SignalId),
}

impl BranchSnapshot {
    pub fn as_action(&self) -> Option<&ActionRecord> {
        match self {
            BranchSnapshot::Action(action) => Some(action),
            _ => None,
        }
    }

    /// Children of a sequential group.
    pub fn children(&self) -> Option<&[BranchSnapshot]> {
        match self {
            BranchSnapshot::Sequential(children) => Some(children),
            _ => None,
        }
    }

    /// Member chains of a parallel group.
    pub fn members(&self) -> Option<&[Vec<BranchSnapshot>]> {
        match self {
            BranchSnapshot::Parallel(members) => Some(members),
            _ => None,
        }
    }

    /// First action of member chain `member`.
    pub fn member_action(&self, member: usize) -> Option<&ActionRecord> {
        self.members()?.get(member)?.first()?.as_action()
    }

    fn collect_actions<'a>(&'a self, out: &mut Vec<&'a ActionRecord>) {
        match self {
            BranchSnapshot::Action(action) => out.push(action),
            BranchSnapshot::Sequential(children) => {
                children.iter().for_each(|c| c.collect_actions(out));
            }
            BranchSnapshot::Parallel(members) => {
                members.iter().flatten().for_each(|c| c.collect_actions(out));
            }
            BranchSnapshot::Signal(_) => {}
        }
    }
}

/// A resolved signal record.
#[derive(Debug, Clone, Serialize)]
pub struct SignalSnapshot {
    pub id: SignalId,
    pub name: String,
    pub input: Map<String, Value>,
    pub branches: Vec<BranchSnapshot>,
    pub parent: Option<ActionId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub store: StoreRef,
}

impl SignalSnapshot {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }

    /// All actions in tree order.
    pub fn actions(&self) -> Vec<&ActionRecord> {
        let mut out = Vec::new();
        for branch in &self.branches {
            branch.collect_actions(&mut out);
        }
        out
    }

    pub fn action_named(&self, name: &str) -> Option<&ActionRecord> {
        self.actions().into_iter().find(|a| a.name == name)
    }

    /// All mutations in tree order (not commit order).
    pub fn mutations(&self) -> Vec<&MutationRecord> {
        self.actions()
            .into_iter()
            .flat_map(|a| a.mutations.iter())
            .collect()
    }
}

impl HistoryStore {
    /// Resolve signal `id` into a snapshot.
    ///
    /// `None` when the signal is unknown or its tree names an action the
    /// arena does not hold.
    pub fn snapshot(&self, id: SignalId, store: StoreRef) -> Option<SignalSnapshot> {
        let record: &SignalRecord = self.signal(id)?;
        let branches = match record
            .branches
            .iter()
            .map(|node| self.resolve(node))
            .collect::<Result<Vec<_>, ActionId>>()
        {
            Ok(branches) => branches,
            Err(action) => {
                tracing::error!(
                    signal_id = id,
                    action_id = %action,
                    "signal tree references an unknown action"
                );
                return None;
            }
        };
        Some(SignalSnapshot {
            id: record.id,
            name: record.name.clone(),
            input: record.input.clone(),
            branches,
            parent: record.parent,
            started_at: record.started_at,
            ended_at: record.ended_at,
            store,
        })
    }

    fn resolve(&self, node: &BranchNode) -> Result<BranchSnapshot, ActionId> {
        Ok(match node {
            BranchNode::Action(id) => {
                BranchSnapshot::Action(self.action(*id).ok_or(*id)?.clone())
            }
            BranchNode::Sequential(children) => BranchSnapshot::Sequential(
                children
                    .iter()
                    .map(|c| self.resolve(c))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            BranchNode::Parallel(members) => BranchSnapshot::Parallel(
                members
                    .iter()
                    .map(|chain| {
                        chain
                            .iter()
                            .map(|c| self.resolve(c))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<_, _>>()?,
            ),
            BranchNode::Signal(id) => BranchSnapshot::Signal(*id),
        })
    }
}
