//! Document references, collection references and queries.

use crate::error::{TransactionError, TxnResult};
use docstore_protocol::{
    Direction, FieldFilter, FieldPath, FilterOp, Order, ResourcePath, RunQueryRequest,
    StructuredQuery, TransactionId, Value,
};
use std::sync::Arc;

/// A reference to a document location. Immutable and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    database: Arc<str>,
    path: ResourcePath,
}

impl DocumentReference {
    pub(crate) fn new(database: Arc<str>, path: ResourcePath) -> Self {
        debug_assert!(path.is_document());
        Self { database, path }
    }

    /// Returns the database name this reference belongs to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the document path.
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Returns the document id (last path segment).
    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }

    /// Returns the collection containing this document.
    pub fn parent(&self) -> CollectionReference {
        CollectionReference {
            database: Arc::clone(&self.database),
            path: self.path.parent().unwrap_or_default(),
        }
    }

    /// Returns a subcollection of this document.
    pub fn collection(&self, id: &str) -> TxnResult<CollectionReference> {
        validate_id(id)?;
        Ok(CollectionReference {
            database: Arc::clone(&self.database),
            path: self.path.child(id),
        })
    }
}

/// A reference to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionReference {
    database: Arc<str>,
    path: ResourcePath,
}

impl CollectionReference {
    pub(crate) fn new(database: Arc<str>, path: ResourcePath) -> Self {
        debug_assert!(path.is_collection());
        Self { database, path }
    }

    /// Returns the collection path.
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Returns the collection id (last path segment).
    pub fn id(&self) -> &str {
        self.path.last_segment().unwrap_or_default()
    }

    /// Returns the document owning this subcollection, if any.
    pub fn parent(&self) -> Option<DocumentReference> {
        let parent = self.path.parent()?;
        parent.is_document().then(|| DocumentReference {
            database: Arc::clone(&self.database),
            path: parent,
        })
    }

    /// Returns a reference to the document `id` in this collection.
    pub fn doc(&self, id: &str) -> TxnResult<DocumentReference> {
        validate_id(id)?;
        Ok(DocumentReference {
            database: Arc::clone(&self.database),
            path: self.path.child(id),
        })
    }

    /// Returns an unfiltered query over this collection.
    pub fn query(&self) -> Query {
        Query {
            database: Arc::clone(&self.database),
            parent: self.path.parent().unwrap_or_default(),
            structured: StructuredQuery::new(self.id()),
        }
    }

    /// Shorthand for `query().where_field(..)`.
    pub fn where_field(&self, field: &str, op: FilterOp, value: impl Into<Value>) -> TxnResult<Query> {
        self.query().where_field(field, op, value)
    }
}

/// A query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    database: Arc<str>,
    parent: ResourcePath,
    structured: StructuredQuery,
}

impl Query {
    /// Adds a field filter.
    pub fn where_field(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> TxnResult<Self> {
        let field = FieldPath::parse(field)?;
        self.structured.filters.push(FieldFilter {
            field,
            op,
            value: value.into(),
        });
        Ok(self)
    }

    /// Adds an ordering clause.
    pub fn order_by(mut self, field: &str, direction: Direction) -> TxnResult<Self> {
        let field = FieldPath::parse(field)?;
        self.structured.order_by.push(Order { field, direction });
        Ok(self)
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: u32) -> Self {
        self.structured.limit = Some(limit);
        self
    }

    /// Returns the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the wire form of the query.
    pub fn structured_query(&self) -> &StructuredQuery {
        &self.structured
    }

    pub(crate) fn to_request(&self, transaction: Option<TransactionId>) -> RunQueryRequest {
        RunQueryRequest {
            database: self.database.to_string(),
            parent: self.parent.clone(),
            structured_query: self.structured.clone(),
            transaction,
        }
    }

    pub(crate) fn document_reference(&self, path: ResourcePath) -> DocumentReference {
        DocumentReference::new(Arc::clone(&self.database), path)
    }
}

/// What a transactional `get` reads.
#[derive(Debug, Clone)]
pub enum ReadTarget {
    /// A single document.
    Document(DocumentReference),
    /// A query.
    Query(Query),
}

impl From<DocumentReference> for ReadTarget {
    fn from(reference: DocumentReference) -> Self {
        ReadTarget::Document(reference)
    }
}

impl From<Query> for ReadTarget {
    fn from(query: Query) -> Self {
        ReadTarget::Query(query)
    }
}

fn validate_id(id: &str) -> TxnResult<()> {
    if id.is_empty() || id.contains('/') {
        return Err(TransactionError::invalid_argument(format!(
            "{id:?} is not a valid id: ids must be non-empty and contain no '/'"
        )));
    }
    Ok(())
}
