use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::{ActionId, SignalId};

/// A node in a signal's execution tree.
///
/// Only ids are stored here; the records themselves live in the history
/// arena and are resolved on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BranchNode {
    Action(ActionId),
    Sequential(Vec<BranchNode>),
    /// Member chains that run concurrently.
    Parallel(Vec<Vec<BranchNode>>),
    /// A signal whose chain is embedded by reference.
    Signal(SignalId),
}

impl BranchNode {
    pub fn kind(&self) -> &'static str {
        match self {
            BranchNode::Action(_) => "action",
            BranchNode::Sequential(_) => "sequential group",
            BranchNode::Parallel(_) => "parallel group",
            BranchNode::Signal(_) => "signal reference",
        }
    }

    /// Action ids in tree order.
    pub fn action_ids(&self) -> Vec<ActionId> {
        let mut out = Vec::new();
        self.collect_actions(&mut out);
        out
    }

    fn collect_actions(&self, out: &mut Vec<ActionId>) {
        match self {
            BranchNode::Action(id) => out.push(*id),
            BranchNode::Sequential(children) => {
                for child in children {
                    child.collect_actions(out);
                }
            }
            BranchNode::Parallel(members) => {
                for child in members.iter().flatten() {
                    child.collect_actions(out);
                }
            }
            BranchNode::Signal(_) => {}
        }
    }
}

/// One step of a [`BranchPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchStep {
    /// Index within a sequential chain.
    Step(usize),
    /// Member chain of the parallel group at the current position.
    Member(usize),
}

/// Position of a node in a signal's execution tree, as reported by the
/// runtime while it walks a chain.
///
/// `BranchPath::at(0).member(1).step(0)` is the first action of the second
/// member of the parallel group that opens the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BranchPath(Vec<BranchStep>);

impl BranchPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn at(index: usize) -> Self {
        Self::root().step(index)
    }

    pub fn step(mut self, index: usize) -> Self {
        self.0.push(BranchStep::Step(index));
        self
    }

    pub fn member(mut self, index: usize) -> Self {
        self.0.push(BranchStep::Member(index));
        self
    }

    pub fn steps(&self) -> &[BranchStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BranchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|step| match step {
                BranchStep::Step(i) => i.to_string(),
                BranchStep::Member(i) => format!("m{i}"),
            })
            .collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// Place `leaf` at `path` inside `chain`, creating groups on first use.
///
/// Returns a description of the problem when the path skips ahead, lands on
/// an occupied slot, or walks through a node of the wrong kind.
pub(crate) fn place(
    chain: &mut Vec<BranchNode>,
    path: &BranchPath,
    leaf: BranchNode,
) -> Result<(), String> {
    place_in_chain(chain, path.steps(), leaf).map_err(|reason| format!("{reason} (at {path})"))
}

fn place_in_chain(
    chain: &mut Vec<BranchNode>,
    steps: &[BranchStep],
    leaf: BranchNode,
) -> Result<(), String> {
    let Some((first, rest)) = steps.split_first() else {
        return Err("branch path ends without a chain step".to_string());
    };
    let BranchStep::Step(index) = *first else {
        return Err(format!("expected a chain step, found {first:?}"));
    };
    if index > chain.len() {
        return Err(format!(
            "step {index} skips ahead of chain length {}",
            chain.len()
        ));
    }

    match rest.first() {
        None => {
            if index < chain.len() {
                return Err(format!(
                    "step {index} is already occupied by a {}",
                    chain[index].kind()
                ));
            }
            chain.push(leaf);
            Ok(())
        }
        Some(BranchStep::Step(_)) => {
            if index == chain.len() {
                chain.push(BranchNode::Sequential(Vec::new()));
            }
            match &mut chain[index] {
                BranchNode::Sequential(children) => place_in_chain(children, rest, leaf),
                other => Err(format!("step {index} is a {}, not a sequential group", other.kind())),
            }
        }
        Some(BranchStep::Member(member)) => {
            let member = *member;
            if index == chain.len() {
                chain.push(BranchNode::Parallel(Vec::new()));
            }
            match &mut chain[index] {
                BranchNode::Parallel(members) => {
                    if member > members.len() {
                        return Err(format!(
                            "member {member} skips ahead of group size {}",
                            members.len()
                        ));
                    }
                    if member == members.len() {
                        members.push(Vec::new());
                    }
                    place_in_chain(&mut members[member], &rest[1..], leaf)
                }
                other => Err(format!("step {index} is a {}, not a parallel group", other.kind())),
            }
        }
    }
}
