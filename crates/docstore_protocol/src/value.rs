//! Document values, timestamps and transaction ids.

use crate::error::PathError;
use crate::path::FieldPath;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field data of a document: a JSON-like object.
pub type DocumentData = Map<String, Value>;

/// A server timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Sub-second nanoseconds.
    pub nanos: i32,
}

impl Timestamp {
    /// Creates a timestamp.
    #[must_use]
    pub const fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Opaque server-assigned transaction identifier.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Bytes);

impl TransactionId {
    /// Returns the raw id bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for TransactionId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&[u8]> for TransactionId {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({self})")
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Looks up a nested field.
pub fn field_value<'a>(data: &'a DocumentData, path: &FieldPath) -> Option<&'a Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = data;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

/// Sets a nested field, creating (or replacing non-object) intermediate maps.
pub fn set_field_value(data: &mut DocumentData, path: &FieldPath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };
    let mut current = data;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.clone(), value);
}

/// Removes a nested field, returning the removed value.
pub fn remove_field_value(data: &mut DocumentData, path: &FieldPath) -> Option<Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = data;
    for segment in parents {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    current.remove(last)
}

/// Returns the path of every leaf field. Empty maps count as leaves.
///
/// Keys are taken verbatim as segments, so `{"a.b": 1}` yields the single
/// segment `a.b`. An empty key anywhere is an error.
pub fn leaf_field_paths(data: &DocumentData) -> Result<Vec<FieldPath>, PathError> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    collect_leaves(data, &mut prefix, &mut out)?;
    Ok(out)
}

fn collect_leaves(
    data: &DocumentData,
    prefix: &mut Vec<String>,
    out: &mut Vec<FieldPath>,
) -> Result<(), PathError> {
    for (key, value) in data {
        prefix.push(key.clone());
        match value {
            Value::Object(nested) if !nested.is_empty() => collect_leaves(nested, prefix, out)?,
            _ => out.push(FieldPath::from_segments(prefix.iter().cloned())?),
        }
        prefix.pop();
    }
    Ok(())
}
