//! Batched document reads.

use crate::error::{TransactionError, TxnResult};
use crate::reference::DocumentReference;
use crate::snapshot::DocumentSnapshot;
use crate::transport::{CallContext, Transport};
use docstore_protocol::{
    BatchGetDocumentsRequest, BatchGetResult, DocumentMask, ResourcePath, RpcError, RpcResult,
    Timestamp, TransactionId,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A set of documents fetched with a single `batchGet`.
///
/// The request carries each distinct path once; results are returned in
/// input order, so duplicate references each get their own snapshot.
#[derive(Debug, Clone)]
pub struct DocumentGroup<'a> {
    documents: &'a [DocumentReference],
    mask: Option<DocumentMask>,
    transaction: Option<TransactionId>,
}

impl<'a> DocumentGroup<'a> {
    /// Creates a group over `documents`.
    pub fn new(documents: &'a [DocumentReference]) -> Self {
        Self {
            documents,
            mask: None,
            transaction: None,
        }
    }

    /// Restricts returned fields to `mask`.
    pub fn with_mask(mut self, mask: Option<DocumentMask>) -> Self {
        self.mask = mask;
        self
    }

    /// Reads inside `transaction`, or standalone when `None`.
    pub fn in_transaction(mut self, transaction: Option<TransactionId>) -> Self {
        self.transaction = transaction;
        self
    }

    /// Checks that the group is non-empty and that every reference belongs
    /// to `database`.
    pub fn validate(&self, database: &str) -> TxnResult<()> {
        if self.documents.is_empty() {
            return Err(TransactionError::invalid_argument(
                "get_all requires at least one document",
            ));
        }
        for (index, doc) in self.documents.iter().enumerate() {
            if doc.database() != database {
                return Err(TransactionError::invalid_argument(format!(
                    "element at index {index} belongs to {}, not {database}",
                    doc.database()
                )));
            }
        }
        Ok(())
    }

    /// Fetches the documents and returns one snapshot per input reference.
    pub fn fetch<T: Transport + ?Sized>(
        &self,
        transport: &T,
        database: &str,
        context: &CallContext,
    ) -> RpcResult<Vec<DocumentSnapshot>> {
        if self.documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let distinct: Vec<ResourcePath> = self
            .documents
            .iter()
            .map(|doc| doc.path())
            .filter(|path| seen.insert(*path))
            .cloned()
            .collect();

        let request = BatchGetDocumentsRequest {
            database: database.to_string(),
            documents: distinct,
            mask: self.mask.clone(),
            transaction: self.transaction.clone(),
        };
        let responses = transport.batch_get_documents(&request, context)?;

        let mut by_path: HashMap<ResourcePath, (BatchGetResult, Timestamp)> = HashMap::new();
        for response in responses {
            let path = response.path().clone();
            if !seen.contains(&path) {
                debug!(
                    request_tag = %context.request_tag,
                    %path,
                    "ignoring unrequested document in batch get response"
                );
                continue;
            }
            by_path.insert(path, (response.result, response.read_time));
        }

        self.documents
            .iter()
            .map(|reference| {
                let (result, read_time) = by_path.get(reference.path()).ok_or_else(|| {
                    RpcError::internal(format!(
                        "did not receive document for {}",
                        reference.path()
                    ))
                })?;
                Ok(match result {
                    BatchGetResult::Found(document) => {
                        DocumentSnapshot::found(reference.clone(), document.clone(), *read_time)
                    }
                    BatchGetResult::Missing(_) => {
                        DocumentSnapshot::missing(reference.clone(), *read_time)
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_tag::RequestTag;
    use crate::transport::MockTransport;
    use docstore_protocol::BatchGetDocumentsResponse;
    use serde_json::json;
    use std::sync::Arc;

    const DB: &str = "projects/p/databases/d";

    fn doc(path: &str) -> DocumentReference {
        DocumentReference::new(Arc::from(DB), ResourcePath::parse_document(path).unwrap())
    }

    fn ctx() -> CallContext {
        CallContext::idempotent(RequestTag::from("tag"))
    }

    #[test]
    fn results_follow_input_order_with_duplicates() {
        let transport = MockTransport::new();
        transport
            .insert_document("users/a", json!({"n": 1}).as_object().cloned().unwrap())
            .unwrap();
        transport
            .insert_document("users/c", json!({"n": 3}).as_object().cloned().unwrap())
            .unwrap();
        transport.set_reverse_batch_get(true);

        let refs = vec![doc("users/a"), doc("users/b"), doc("users/c"), doc("users/a")];
        let snapshots = DocumentGroup::new(&refs).fetch(&transport, DB, &ctx()).unwrap();

        let ids: Vec<_> = snapshots.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "a"]);
        assert!(snapshots[0].exists());
        assert!(!snapshots[1].exists());
        assert_eq!(snapshots[2].get("n"), Some(&json!(3)));
        assert_eq!(snapshots[3], snapshots[0]);

        // Each distinct path requested once
        let requests = transport.batch_get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].documents.len(), 3);
    }

    #[test]
    fn transaction_and_mask_are_forwarded() {
        let transport = MockTransport::new();
        let refs = vec![doc("users/a")];
        let mask = DocumentMask::new(vec![docstore_protocol::FieldPath::parse("n").unwrap()]);
        let id = TransactionId::from(vec![4, 2]);

        DocumentGroup::new(&refs)
            .with_mask(Some(mask.clone()))
            .in_transaction(Some(id.clone()))
            .fetch(&transport, DB, &ctx())
            .unwrap();

        let request = &transport.batch_get_requests()[0];
        assert_eq!(request.transaction, Some(id));
        assert_eq!(request.mask, Some(mask));
    }

    #[test]
    fn missing_response_is_an_error() {
        struct Forgetful;
        impl Transport for Forgetful {
            fn begin_transaction(
                &self,
                _: &docstore_protocol::BeginTransactionRequest,
                _: &CallContext,
            ) -> RpcResult<docstore_protocol::BeginTransactionResponse> {
                unreachable!()
            }
            fn commit(
                &self,
                _: &docstore_protocol::CommitRequest,
                _: &CallContext,
            ) -> RpcResult<docstore_protocol::CommitResponse> {
                unreachable!()
            }
            fn rollback(&self, _: &docstore_protocol::RollbackRequest, _: &CallContext) -> RpcResult<()> {
                unreachable!()
            }
            fn batch_get_documents(
                &self,
                request: &BatchGetDocumentsRequest,
                _: &CallContext,
            ) -> RpcResult<Vec<BatchGetDocumentsResponse>> {
                // Answers only for the first path
                Ok(vec![BatchGetDocumentsResponse {
                    result: BatchGetResult::Missing(request.documents[0].clone()),
                    read_time: Timestamp::new(1, 0),
                }])
            }
            fn run_query(
                &self,
                _: &docstore_protocol::RunQueryRequest,
                _: &CallContext,
            ) -> RpcResult<Vec<docstore_protocol::RunQueryResponse>> {
                unreachable!()
            }
        }

        let refs = vec![doc("users/a"), doc("users/b")];
        let err = DocumentGroup::new(&refs).fetch(&Forgetful, DB, &ctx()).unwrap_err();
        assert!(err.message.contains("users/b"));
    }

    #[test]
    fn validate_names_the_foreign_element() {
        let other = DocumentReference::new(
            Arc::from("projects/other/databases/d"),
            ResourcePath::parse_document("users/b").unwrap(),
        );
        let refs = vec![doc("users/a"), other];
        let err = DocumentGroup::new(&refs).validate(DB).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidArgument { .. }));
        assert!(err.to_string().contains("index 1"));

        assert!(DocumentGroup::new(&[]).validate(DB).is_err());
        assert!(DocumentGroup::new(&refs[..1]).validate(DB).is_ok());
    }

    #[test]
    fn empty_group_makes_no_call() {
        let transport = MockTransport::new();
        let snapshots = DocumentGroup::new(&[]).fetch(&transport, DB, &ctx()).unwrap();
        assert!(snapshots.is_empty());
        assert!(transport.calls().is_empty());
    }
}
