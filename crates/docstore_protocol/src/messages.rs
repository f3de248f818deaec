//! Request and response messages.

use crate::path::ResourcePath;
use crate::query::StructuredQuery;
use crate::value::{DocumentData, Timestamp, TransactionId};
use crate::write::{DocumentMask, Write, WriteResult};
use serde::{Deserialize, Serialize};

/// The RPC methods of the transaction protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    /// Start a transaction.
    BeginTransaction,
    /// Commit buffered writes.
    Commit,
    /// Abandon a transaction.
    Rollback,
    /// Fetch a batch of documents.
    BatchGetDocuments,
    /// Run a structured query.
    RunQuery,
}

impl RpcMethod {
    /// Returns the method name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::BeginTransaction => "beginTransaction",
            RpcMethod::Commit => "commit",
            RpcMethod::Rollback => "rollback",
            RpcMethod::BatchGetDocuments => "batchGet",
            RpcMethod::RunQuery => "runQuery",
        }
    }

    /// Parses a wire method name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "beginTransaction" => Some(RpcMethod::BeginTransaction),
            "commit" => Some(RpcMethod::Commit),
            "rollback" => Some(RpcMethod::Rollback),
            "batchGet" => Some(RpcMethod::BatchGetDocuments),
            "runQuery" => Some(RpcMethod::RunQuery),
            _ => None,
        }
    }
}

/// A stored document as returned by reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document path.
    pub path: ResourcePath,
    /// Field data.
    pub fields: DocumentData,
    /// Creation time.
    pub create_time: Timestamp,
    /// Last update time.
    pub update_time: Timestamp,
}

/// Options for a read-write transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWriteOptions {
    /// Id of the failed transaction this one replaces.
    pub retry_transaction: Option<TransactionId>,
}

/// Transaction options sent with `beginTransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOptions {
    /// Read-write options.
    pub read_write: ReadWriteOptions,
}

/// `beginTransaction` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginTransactionRequest {
    /// Database name.
    pub database: String,
    /// Options, present only when retrying a previous transaction.
    pub options: Option<TransactionOptions>,
}

impl BeginTransactionRequest {
    /// Creates a request for a fresh transaction.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            options: None,
        }
    }

    /// Creates a request that retries `previous`.
    pub fn retrying(database: impl Into<String>, previous: TransactionId) -> Self {
        Self {
            database: database.into(),
            options: Some(TransactionOptions {
                read_write: ReadWriteOptions {
                    retry_transaction: Some(previous),
                },
            }),
        }
    }

    /// Returns the retried transaction id, if any.
    pub fn retry_marker(&self) -> Option<&TransactionId> {
        self.options
            .as_ref()
            .and_then(|o| o.read_write.retry_transaction.as_ref())
    }
}

/// `beginTransaction` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginTransactionResponse {
    /// The new transaction id.
    pub transaction: TransactionId,
}

/// `commit` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Database name.
    pub database: String,
    /// Writes, applied atomically in order.
    pub writes: Vec<Write>,
    /// Transaction to commit; `None` for a standalone batch.
    pub transaction: Option<TransactionId>,
}

/// `commit` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResponse {
    /// One result per write, in request order.
    pub write_results: Vec<WriteResult>,
    /// Commit time.
    pub commit_time: Option<Timestamp>,
}

/// `rollback` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    /// Database name.
    pub database: String,
    /// Transaction to roll back.
    pub transaction: TransactionId,
}

/// `batchGet` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchGetDocumentsRequest {
    /// Database name.
    pub database: String,
    /// Distinct document paths to fetch.
    pub documents: Vec<ResourcePath>,
    /// Fields to return; `None` returns all fields.
    pub mask: Option<DocumentMask>,
    /// Transaction to read in; `None` for a standalone read.
    pub transaction: Option<TransactionId>,
}

/// Outcome for one requested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchGetResult {
    /// The document exists.
    Found(Document),
    /// The document does not exist.
    Missing(ResourcePath),
}

/// One streamed `batchGet` response element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGetDocumentsResponse {
    /// Found or missing document.
    pub result: BatchGetResult,
    /// Time the document was read.
    pub read_time: Timestamp,
}

impl BatchGetDocumentsResponse {
    /// Returns the path this element answers for.
    pub fn path(&self) -> &ResourcePath {
        match &self.result {
            BatchGetResult::Found(doc) => &doc.path,
            BatchGetResult::Missing(path) => path,
        }
    }
}

/// `runQuery` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunQueryRequest {
    /// Database name.
    pub database: String,
    /// Parent document path (root for top-level collections).
    pub parent: ResourcePath,
    /// The query.
    pub structured_query: StructuredQuery,
    /// Transaction to read in; `None` for a standalone query.
    pub transaction: Option<TransactionId>,
}

/// One streamed `runQuery` response element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunQueryResponse {
    /// A matching document; `None` on the trailing progress element.
    pub document: Option<Document>,
    /// Time the result was read.
    pub read_time: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for method in [
            RpcMethod::BeginTransaction,
            RpcMethod::Commit,
            RpcMethod::Rollback,
            RpcMethod::BatchGetDocuments,
            RpcMethod::RunQuery,
        ] {
            assert_eq!(RpcMethod::from_name(method.as_str()), Some(method));
        }
        assert_eq!(RpcMethod::from_name("listen"), None);
    }

    #[test]
    fn fresh_begin_has_no_marker() {
        let request = BeginTransactionRequest::new("projects/p/databases/d");
        assert!(request.options.is_none());
        assert!(request.retry_marker().is_none());
    }
}
