use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::branch::BranchNode;

/// Position of a signal in the history (zero-based insertion index).
pub type SignalId = usize;

/// Index of an action in the history's action arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub usize);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One segment of a state path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "{i}"),
            PathSegment::Key(k) => write!(f, "{k}"),
        }
    }
}

/// Render a path as `a.b.0` for logs and error messages.
pub fn display_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// A single call to a state mutation primitive.
///
/// `sequence_id` is the global commit order; it is never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub name: String,
    pub path: Vec<PathSegment>,
    pub args: Vec<Value>,
    pub sequence_id: u64,
}

impl MutationRecord {
    /// Compare name, path and args, ignoring the sequence id.
    pub fn same_call(&self, name: &str, path: &[PathSegment], args: &[Value]) -> bool {
        self.name == name && self.path == path && self.args == args
    }
}

/// One executed step of a signal's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: ActionId,
    pub signal: SignalId,
    pub name: String,
    pub is_async: bool,
    pub mutations: Vec<MutationRecord>,
    /// Signals triggered while this action was the active context.
    pub signals: Vec<SignalId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Input handed to a signal by the runtime.
///
/// `defaulted` names the fields the runtime filled in on its own; they are
/// never recorded.
#[derive(Debug, Clone, Default)]
pub struct SignalInput {
    pub fields: Map<String, Value>,
    pub defaulted: HashSet<String>,
}

impl SignalInput {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            defaulted: HashSet::new(),
        }
    }

    /// Build from a JSON value; anything but an object yields empty input.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(fields),
            _ => Self::default(),
        }
    }

    /// Add a field the runtime supplied by default.
    pub fn with_default(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        self.fields.insert(key.clone(), value);
        self.defaulted.insert(key);
        self
    }

    /// Fields explicitly passed by the caller, minus `ignored`.
    pub fn explicit_fields(&self, ignored: &[String]) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| !self.defaulted.contains(*key))
            .filter(|(key, _)| !ignored.iter().any(|i| i == *key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// One signal invocation, as kept in the history arena.
#[derive(Debug, Clone)]
pub struct SignalRecord {
    pub id: SignalId,
    pub name: String,
    pub input: Map<String, Value>,
    pub branches: Vec<BranchNode>,
    /// Action that was active when this signal was triggered.
    pub parent: Option<ActionId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SignalRecord {
    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}
