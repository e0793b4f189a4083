//! State container seam.
//!
//! The recorder never defines what a mutation does; it only sees calls made
//! against a [`StateContainer`]. [`JsonState`] is a small container over a
//! JSON tree with `set`, `unset`, `merge` and `push` primitives.

use serde_json::{Map, Value};

use crate::error::MutationError;
use crate::history::{display_path, PathSegment};

/// Mutation primitives of a host state container.
pub trait StateContainer {
    /// Apply primitive `name` at `path` with `args`.
    fn apply(&mut self, name: &str, path: &[PathSegment], args: &[Value])
        -> Result<(), MutationError>;

    /// Return to the initial state.
    fn reset(&mut self);
}

/// Typed helpers over [`StateContainer::apply`].
pub trait StateContainerExt: StateContainer {
    fn set<P: Into<PathSegment>>(
        &mut self,
        path: impl IntoIterator<Item = P>,
        value: Value,
    ) -> Result<(), MutationError> {
        let path = collect_path(path);
        self.apply("set", &path, &[value])
    }

    fn unset<P: Into<PathSegment>>(
        &mut self,
        path: impl IntoIterator<Item = P>,
    ) -> Result<(), MutationError> {
        let path = collect_path(path);
        self.apply("unset", &path, &[])
    }

    fn merge<P: Into<PathSegment>>(
        &mut self,
        path: impl IntoIterator<Item = P>,
        value: Value,
    ) -> Result<(), MutationError> {
        let path = collect_path(path);
        self.apply("merge", &path, &[value])
    }

    fn push<P: Into<PathSegment>>(
        &mut self,
        path: impl IntoIterator<Item = P>,
        value: Value,
    ) -> Result<(), MutationError> {
        let path = collect_path(path);
        self.apply("push", &path, &[value])
    }
}

impl<T: StateContainer + ?Sized> StateContainerExt for T {}

fn collect_path<P: Into<PathSegment>>(path: impl IntoIterator<Item = P>) -> Vec<PathSegment> {
    path.into_iter().map(Into::into).collect()
}

/// JSON-backed state tree with a fixed initial snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonState {
    initial: Value,
    current: Value,
}

impl JsonState {
    pub fn new(initial: Value) -> Self {
        Self {
            current: initial.clone(),
            initial,
        }
    }

    pub fn get(&self) -> &Value {
        &self.current
    }

    pub fn get_in(&self, path: &[PathSegment]) -> Option<&Value> {
        path.iter().try_fold(&self.current, |node, segment| match segment {
            PathSegment::Key(key) => node.get(key.as_str()),
            PathSegment::Index(index) => node.get(*index),
        })
    }

    /// Walk to `path`, creating objects for missing keys.
    fn slot_mut(&mut self, name: &str, path: &[PathSegment]) -> Result<&mut Value, MutationError> {
        let invalid = || MutationError::InvalidPath {
            primitive: name.to_string(),
            path: display_path(path),
        };
        let mut node = &mut self.current;
        for segment in path {
            node = match segment {
                PathSegment::Key(key) => {
                    if node.is_null() {
                        *node = Value::Object(Map::new());
                    }
                    node.as_object_mut()
                        .ok_or_else(invalid)?
                        .entry(key.clone())
                        .or_insert(Value::Null)
                }
                PathSegment::Index(index) => node
                    .as_array_mut()
                    .and_then(|items| items.get_mut(*index))
                    .ok_or_else(invalid)?,
            };
        }
        Ok(node)
    }

    fn single_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, MutationError> {
        match args {
            [value] => Ok(value),
            _ => Err(MutationError::InvalidArguments {
                primitive: name.to_string(),
                reason: format!("expected 1 argument, got {}", args.len()),
            }),
        }
    }
}

impl Default for JsonState {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl StateContainer for JsonState {
    fn apply(
        &mut self,
        name: &str,
        path: &[PathSegment],
        args: &[Value],
    ) -> Result<(), MutationError> {
        match name {
            "set" => {
                let value = Self::single_arg(name, args)?.clone();
                *self.slot_mut(name, path)? = value;
            }
            "unset" => {
                let Some((last, parent)) = path.split_last() else {
                    return Err(MutationError::InvalidPath {
                        primitive: name.to_string(),
                        path: String::new(),
                    });
                };
                let parent = self.slot_mut(name, parent)?;
                match (parent, last) {
                    (Value::Object(map), PathSegment::Key(key)) => {
                        map.remove(key);
                    }
                    (Value::Array(items), PathSegment::Index(index)) if *index < items.len() => {
                        items.remove(*index);
                    }
                    _ => {
                        return Err(MutationError::InvalidPath {
                            primitive: name.to_string(),
                            path: display_path(path),
                        })
                    }
                }
            }
            "merge" => {
                let Value::Object(patch) = Self::single_arg(name, args)? else {
                    return Err(MutationError::InvalidArguments {
                        primitive: name.to_string(),
                        reason: "merge expects an object".to_string(),
                    });
                };
                let patch = patch.clone();
                let slot = self.slot_mut(name, path)?;
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
                let target = slot.as_object_mut().ok_or_else(|| MutationError::InvalidPath {
                    primitive: name.to_string(),
                    path: display_path(path),
                })?;
                target.extend(patch);
            }
            "push" => {
                let value = Self::single_arg(name, args)?.clone();
                let slot = self.slot_mut(name, path)?;
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                slot.as_array_mut()
                    .ok_or_else(|| MutationError::InvalidPath {
                        primitive: name.to_string(),
                        path: display_path(path),
                    })?
                    .push(value);
            }
            other => return Err(MutationError::UnknownPrimitive(other.to_string())),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.current = self.initial.clone();
    }
}
