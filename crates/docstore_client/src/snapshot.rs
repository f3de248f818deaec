//! Read results.

use crate::reference::{DocumentReference, Query};
use docstore_protocol::{field_value, Document, DocumentData, FieldPath, Timestamp, Value};

/// A document as read at a point in time. `data` is `None` if it did not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    reference: DocumentReference,
    data: Option<DocumentData>,
    create_time: Option<Timestamp>,
    update_time: Option<Timestamp>,
    read_time: Timestamp,
}

impl DocumentSnapshot {
    pub(crate) fn found(reference: DocumentReference, document: Document, read_time: Timestamp) -> Self {
        Self {
            reference,
            data: Some(document.fields),
            create_time: Some(document.create_time),
            update_time: Some(document.update_time),
            read_time,
        }
    }

    pub(crate) fn missing(reference: DocumentReference, read_time: Timestamp) -> Self {
        Self {
            reference,
            data: None,
            create_time: None,
            update_time: None,
            read_time,
        }
    }

    /// Returns the reference this snapshot was read from.
    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }

    /// Returns the document id.
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Returns true if the document existed.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the document fields.
    pub fn data(&self) -> Option<&DocumentData> {
        self.data.as_ref()
    }

    /// Returns a (possibly nested) field. Invalid paths yield `None`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        let path = FieldPath::parse(field).ok()?;
        field_value(self.data.as_ref()?, &path)
    }

    /// Returns the creation time.
    pub fn create_time(&self) -> Option<Timestamp> {
        self.create_time
    }

    /// Returns the last update time.
    pub fn update_time(&self) -> Option<Timestamp> {
        self.update_time
    }

    /// Returns the read time.
    pub fn read_time(&self) -> Timestamp {
        self.read_time
    }
}

/// The result of a query.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    query: Query,
    docs: Vec<DocumentSnapshot>,
    read_time: Option<Timestamp>,
}

impl QuerySnapshot {
    pub(crate) fn new(query: Query, docs: Vec<DocumentSnapshot>, read_time: Option<Timestamp>) -> Self {
        Self {
            query,
            docs,
            read_time,
        }
    }

    /// Returns the query that produced this snapshot.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Returns the matching documents.
    pub fn docs(&self) -> &[DocumentSnapshot] {
        &self.docs
    }

    /// Returns the number of matching documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Returns the read time, if the server reported one.
    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}

/// Result of [`Transaction::get`](crate::Transaction::get).
#[derive(Debug, Clone)]
pub enum ReadResult {
    /// Result of a document read.
    Document(DocumentSnapshot),
    /// Result of a query.
    Query(QuerySnapshot),
}

impl ReadResult {
    /// Returns the document snapshot, if this was a document read.
    pub fn into_document(self) -> Option<DocumentSnapshot> {
        match self {
            ReadResult::Document(snapshot) => Some(snapshot),
            ReadResult::Query(_) => None,
        }
    }

    /// Returns the query snapshot, if this was a query.
    pub fn into_query(self) -> Option<QuerySnapshot> {
        match self {
            ReadResult::Query(snapshot) => Some(snapshot),
            ReadResult::Document(_) => None,
        }
    }
}
