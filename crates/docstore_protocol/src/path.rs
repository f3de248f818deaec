//! Resource and field paths.

use crate::error::PathError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified database name (`projects/{project}/databases/{database}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseName {
    project_id: String,
    database_id: String,
}

impl DatabaseName {
    /// Creates a database name.
    pub fn new(project_id: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: database_id.into(),
        }
    }

    /// Returns the project id.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the database id.
    pub fn database_id(&self) -> &str {
        &self.database_id
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/databases/{}",
            self.project_id, self.database_id
        )
    }
}

/// A slash-separated path relative to the database's document root.
///
/// Documents live at even-length paths (`users/alice`), collections at
/// odd-length paths (`users`, `users/alice/posts`). The empty path is the
/// root, which is the parent of top-level collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// Returns the root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a slash-separated path. Leading and trailing slashes are ignored.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(PathError::EmptySegment {
                    path: path.to_string(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Parses a path that must point at a document.
    pub fn parse_document(path: &str) -> Result<Self, PathError> {
        let parsed = Self::parse(path)?;
        if !parsed.is_document() {
            return Err(PathError::WrongKind {
                path: path.to_string(),
                expected: "document",
            });
        }
        Ok(parsed)
    }

    /// Parses a path that must point at a collection.
    pub fn parse_collection(path: &str) -> Result<Self, PathError> {
        let parsed = Self::parse(path)?;
        if !parsed.is_collection() {
            return Err(PathError::WrongKind {
                path: path.to_string(),
                expected: "collection",
            });
        }
        Ok(parsed)
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if this path names a document.
    pub fn is_document(&self) -> bool {
        !self.segments.is_empty() && self.segments.len() % 2 == 0
    }

    /// Returns true if this path names a collection.
    pub fn is_collection(&self) -> bool {
        self.segments.len() % 2 == 1
    }

    /// Returns the last segment, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns a child path with the given segment appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Returns true if `other` is a direct child of this path.
    pub fn is_parent_of(&self, other: &ResourcePath) -> bool {
        other.segments.len() == self.segments.len() + 1
            && other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for ResourcePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self::root());
        }
        Self::parse(&value)
    }
}

/// A path to a (possibly nested) field inside a document.
///
/// Parsed from dotted notation, but carried on the wire as its segments so
/// that a key containing `.` stays a single segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted field path (`"address.city"`).
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(PathError::EmptySegment {
                    path: path.to_string(),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Builds a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment {
                path: segments.join("."),
            });
        }
        Ok(Self { segments })
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true if this path equals `other` or is an ancestor of it.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<FieldPath> for Vec<String> {
    fn from(path: FieldPath) -> Self {
        path.segments
    }
}

impl TryFrom<Vec<String>> for FieldPath {
    type Error = PathError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_segments(segments)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
