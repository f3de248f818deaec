//! Writes, preconditions and masks.

use crate::path::{FieldPath, ResourcePath};
use crate::value::{DocumentData, Timestamp};
use serde::{Deserialize, Serialize};

/// A set of field paths limiting which fields a write touches or a read returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMask {
    /// The masked field paths.
    pub field_paths: Vec<FieldPath>,
}

impl DocumentMask {
    /// Creates a mask from field paths.
    pub fn new(field_paths: Vec<FieldPath>) -> Self {
        Self { field_paths }
    }

    /// Returns true if `path` is covered by the mask.
    pub fn covers(&self, path: &FieldPath) -> bool {
        self.field_paths.iter().any(|p| p.is_prefix_of(path))
    }
}

/// A condition the server checks before applying a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    /// The document must (or must not) exist.
    Exists(bool),
    /// The document must have been last updated at exactly this time.
    UpdateTime(Timestamp),
}

/// What a write does to its target document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteKind {
    /// Replace the document, or only the masked fields when a mask is present.
    Update(DocumentData),
    /// Delete the document.
    Delete,
}

/// A single buffered mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Write {
    /// Target document path.
    pub document: ResourcePath,
    /// Operation to apply.
    pub kind: WriteKind,
    /// For updates: which fields to touch. `None` replaces the whole document.
    pub update_mask: Option<DocumentMask>,
    /// Optional server-side precondition.
    pub precondition: Option<Precondition>,
}

impl Write {
    /// Returns true if this write deletes its document.
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, WriteKind::Delete)
    }
}

/// Outcome of one write in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Time the document was last updated after the write, if it exists.
    pub update_time: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_covers_nested_fields() {
        let mask = DocumentMask::new(vec![FieldPath::parse("address").unwrap()]);
        assert!(mask.covers(&FieldPath::parse("address.city").unwrap()));
        assert!(!mask.covers(&FieldPath::parse("name").unwrap()));
    }
}
