//! JSON-Patch style operations over the canonical schema.
//!
//! Paths are JSON Pointers (`/tables/users/columns/email`). Application is
//! strict: intermediate segments must already exist, `replace` and
//! `remove` need an existing leaf, `add` upserts the leaf.

pub mod change_status;
pub mod compare;
pub mod version;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::schema::Schema;

pub use change_status::{get_change_status, ChangeStatus, PathPattern};
pub use compare::compare;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Add,
    Remove,
    Replace,
}

impl Operation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Remove { path } | Self::Replace { path, .. } => path,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Add { value, .. } | Self::Replace { value, .. } => Some(value),
            Self::Remove { .. } => None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Add { .. } => OperationKind::Add,
            Self::Remove { .. } => OperationKind::Remove,
            Self::Replace { .. } => OperationKind::Replace,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("invalid JSON pointer \"{0}\"")]
    InvalidPath(String),
    #[error("operation {index}: path \"{path}\" not found")]
    PathNotFound { index: usize, path: String },
    #[error("patched document is not a valid schema: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Split a JSON Pointer into unescaped segments. The empty pointer is the
/// whole document.
pub fn parse_pointer(path: &str) -> Result<Vec<String>, ApplyError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(ApplyError::InvalidPath(path.to_string()));
    };
    Ok(rest
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect())
}

pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Build a pointer from raw segments.
pub fn pointer(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", escape_pointer_segment(s)))
        .collect()
}

/// Apply `operations` in order to a copy of `document`.
pub fn apply_patch_operations(
    document: &Value,
    operations: &[Operation],
) -> Result<Value, ApplyError> {
    let mut result = document.clone();
    for (index, operation) in operations.iter().enumerate() {
        trace!(index, path = operation.path(), "applying operation");
        apply_one(&mut result, index, operation)?;
    }
    Ok(result)
}

fn apply_one(document: &mut Value, index: usize, operation: &Operation) -> Result<(), ApplyError> {
    let path = operation.path();
    let not_found = || ApplyError::PathNotFound {
        index,
        path: path.to_string(),
    };

    let segments = parse_pointer(path)?;
    let Some((leaf, parents)) = segments.split_last() else {
        // Root pointer
        return match operation {
            Operation::Add { value, .. } | Operation::Replace { value, .. } => {
                *document = value.clone();
                Ok(())
            }
            Operation::Remove { .. } => Err(not_found()),
        };
    };

    let mut parent = &mut *document;
    for segment in parents {
        parent = child_mut(parent, segment).ok_or_else(not_found)?;
    }

    match (operation, parent) {
        (Operation::Add { value, .. }, Value::Object(map)) => {
            map.insert(leaf.clone(), value.clone());
        }
        (Operation::Add { value, .. }, Value::Array(items)) => {
            if leaf == "-" {
                items.push(value.clone());
            } else {
                let at = array_index(leaf).filter(|&i| i <= items.len()).ok_or_else(not_found)?;
                items.insert(at, value.clone());
            }
        }
        (Operation::Replace { value, .. }, parent) => {
            let slot = child_mut(parent, leaf).ok_or_else(not_found)?;
            *slot = value.clone();
        }
        (Operation::Remove { .. }, Value::Object(map)) => {
            map.shift_remove(leaf.as_str()).ok_or_else(not_found)?;
        }
        (Operation::Remove { .. }, Value::Array(items)) => {
            let at = array_index(leaf).filter(|&i| i < items.len()).ok_or_else(not_found)?;
            items.remove(at);
        }
        _ => return Err(not_found()),
    }
    Ok(())
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => array_index(segment).and_then(|i| items.get_mut(i)),
        _ => None,
    }
}

/// Array index per RFC 6901: digits only, no leading zeros.
fn array_index(segment: &str) -> Option<usize> {
    if segment.is_empty()
        || !segment.bytes().all(|b| b.is_ascii_digit())
        || (segment.len() > 1 && segment.starts_with('0'))
    {
        return None;
    }
    segment.parse().ok()
}

impl Schema {
    /// Apply a patch and decode the result back into a schema.
    pub fn apply(&self, operations: &[Operation]) -> Result<Schema, ApplyError> {
        let document = serde_json::to_value(self)?;
        let patched = apply_patch_operations(&document, operations)?;
        Ok(serde_json::from_value(patched)?)
    }
}
