//! Transport layer abstraction for transaction RPCs.

use crate::request_tag::RequestTag;
use docstore_protocol::{
    BatchGetDocumentsRequest, BatchGetDocumentsResponse, BatchGetResult, BeginTransactionRequest,
    BeginTransactionResponse, CommitRequest, CommitResponse, Document, DocumentData, PathError,
    ResourcePath, RollbackRequest, RpcError, RpcMethod, RpcResult, RunQueryRequest, RunQueryResponse, Timestamp,
    TransactionId, WriteResult,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};

/// Per-call metadata passed alongside every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Correlation tag of the logical transaction.
    pub request_tag: RequestTag,
    /// Whether the transport may transparently re-send the call.
    pub idempotent: bool,
}

impl CallContext {
    /// Context for a call the transport may retry.
    pub fn idempotent(request_tag: RequestTag) -> Self {
        Self {
            request_tag,
            idempotent: true,
        }
    }

    /// Context for a call the transport must send at most once.
    pub fn once(request_tag: RequestTag) -> Self {
        Self {
            request_tag,
            idempotent: false,
        }
    }
}

/// A transport executes transaction RPCs against the server.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, gRPC, in-process emulator, mock for testing).
/// Calls block until the server answers or the transport gives up.
pub trait Transport: Send + Sync {
    /// Starts a transaction.
    fn begin_transaction(
        &self,
        request: &BeginTransactionRequest,
        context: &CallContext,
    ) -> RpcResult<BeginTransactionResponse>;

    /// Commits writes.
    fn commit(&self, request: &CommitRequest, context: &CallContext) -> RpcResult<CommitResponse>;

    /// Rolls back a transaction.
    fn rollback(&self, request: &RollbackRequest, context: &CallContext) -> RpcResult<()>;

    /// Fetches documents; the response stream may arrive in any order.
    fn batch_get_documents(
        &self,
        request: &BatchGetDocumentsRequest,
        context: &CallContext,
    ) -> RpcResult<Vec<BatchGetDocumentsResponse>>;

    /// Runs a query.
    fn run_query(
        &self,
        request: &RunQueryRequest,
        context: &CallContext,
    ) -> RpcResult<Vec<RunQueryResponse>>;
}

/// A request observed by [`MockTransport`].
#[derive(Debug, Clone)]
pub enum RecordedCall {
    /// `beginTransaction`.
    BeginTransaction(BeginTransactionRequest, CallContext),
    /// `commit`.
    Commit(CommitRequest, CallContext),
    /// `rollback`.
    Rollback(RollbackRequest, CallContext),
    /// `batchGet`.
    BatchGetDocuments(BatchGetDocumentsRequest, CallContext),
    /// `runQuery`.
    RunQuery(RunQueryRequest, CallContext),
}

impl RecordedCall {
    /// Returns the RPC method of the call.
    pub fn method(&self) -> RpcMethod {
        match self {
            RecordedCall::BeginTransaction(..) => RpcMethod::BeginTransaction,
            RecordedCall::Commit(..) => RpcMethod::Commit,
            RecordedCall::Rollback(..) => RpcMethod::Rollback,
            RecordedCall::BatchGetDocuments(..) => RpcMethod::BatchGetDocuments,
            RecordedCall::RunQuery(..) => RpcMethod::RunQuery,
        }
    }

    /// Returns the call context.
    pub fn context(&self) -> &CallContext {
        match self {
            RecordedCall::BeginTransaction(_, ctx)
            | RecordedCall::Commit(_, ctx)
            | RecordedCall::Rollback(_, ctx)
            | RecordedCall::BatchGetDocuments(_, ctx)
            | RecordedCall::RunQuery(_, ctx) => ctx,
        }
    }
}

#[derive(Default)]
struct MockState {
    documents: BTreeMap<ResourcePath, Document>,
    begin_responses: VecDeque<RpcResult<BeginTransactionResponse>>,
    commit_responses: VecDeque<RpcResult<CommitResponse>>,
    rollback_responses: VecDeque<RpcResult<()>>,
    batch_get_failures: VecDeque<RpcError>,
    query_responses: VecDeque<RpcResult<Vec<RunQueryResponse>>>,
    reverse_batch_get: bool,
    next_transaction: u64,
    clock: i64,
    calls: Vec<RecordedCall>,
}

impl MockState {
    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp::new(self.clock, 0)
    }
}

/// A mock transport for testing.
///
/// Scripted responses are consumed first; when none is queued the mock
/// answers with a plausible default (fresh transaction ids, successful
/// commits, reads from an in-memory document map). Every call is recorded.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document served by `batchGet` and `runQuery`.
    pub fn insert_document(&self, path: &str, fields: DocumentData) -> Result<(), PathError> {
        let path = ResourcePath::parse_document(path)?;
        let mut state = self.state.lock();
        let now = state.tick();
        state.documents.insert(
            path.clone(),
            Document {
                path,
                fields,
                create_time: now,
                update_time: now,
            },
        );
        Ok(())
    }

    /// Queues the next `beginTransaction` outcome.
    pub fn push_begin_response(&self, response: RpcResult<BeginTransactionResponse>) {
        self.state.lock().begin_responses.push_back(response);
    }

    /// Queues the next `commit` outcome.
    pub fn push_commit_response(&self, response: RpcResult<CommitResponse>) {
        self.state.lock().commit_responses.push_back(response);
    }

    /// Queues the next `rollback` outcome.
    pub fn push_rollback_response(&self, response: RpcResult<()>) {
        self.state.lock().rollback_responses.push_back(response);
    }

    /// Makes the next `batchGet` fail.
    pub fn push_batch_get_failure(&self, error: RpcError) {
        self.state.lock().batch_get_failures.push_back(error);
    }

    /// Queues the next `runQuery` outcome.
    pub fn push_query_response(&self, response: RpcResult<Vec<RunQueryResponse>>) {
        self.state.lock().query_responses.push_back(response);
    }

    /// Streams `batchGet` results in reverse request order.
    pub fn set_reverse_batch_get(&self, reverse: bool) {
        self.state.lock().reverse_batch_get = reverse;
    }

    /// Returns every recorded call.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the methods of every recorded call, in order.
    pub fn methods(&self) -> Vec<RpcMethod> {
        self.state.lock().calls.iter().map(RecordedCall::method).collect()
    }

    /// Returns the recorded `beginTransaction` requests.
    pub fn begin_requests(&self) -> Vec<BeginTransactionRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::BeginTransaction(request, _) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the recorded `commit` requests.
    pub fn commit_requests(&self) -> Vec<CommitRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Commit(request, _) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the recorded `rollback` requests.
    pub fn rollback_requests(&self) -> Vec<RollbackRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Rollback(request, _) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the recorded `batchGet` requests.
    pub fn batch_get_requests(&self) -> Vec<BatchGetDocumentsRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::BatchGetDocuments(request, _) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Transport for MockTransport {
    fn begin_transaction(
        &self,
        request: &BeginTransactionRequest,
        context: &CallContext,
    ) -> RpcResult<BeginTransactionResponse> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::BeginTransaction(
            request.clone(),
            context.clone(),
        ));
        if let Some(response) = state.begin_responses.pop_front() {
            return response;
        }
        state.next_transaction += 1;
        Ok(BeginTransactionResponse {
            transaction: TransactionId::from(state.next_transaction.to_be_bytes().to_vec()),
        })
    }

    fn commit(&self, request: &CommitRequest, context: &CallContext) -> RpcResult<CommitResponse> {
        let mut state = self.state.lock();
        state
            .calls
            .push(RecordedCall::Commit(request.clone(), context.clone()));
        if let Some(response) = state.commit_responses.pop_front() {
            return response;
        }
        let commit_time = state.tick();
        Ok(CommitResponse {
            write_results: request
                .writes
                .iter()
                .map(|w| WriteResult {
                    update_time: (!w.is_delete()).then_some(commit_time),
                })
                .collect(),
            commit_time: Some(commit_time),
        })
    }

    fn rollback(&self, request: &RollbackRequest, context: &CallContext) -> RpcResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(RecordedCall::Rollback(request.clone(), context.clone()));
        state.rollback_responses.pop_front().unwrap_or(Ok(()))
    }

    fn batch_get_documents(
        &self,
        request: &BatchGetDocumentsRequest,
        context: &CallContext,
    ) -> RpcResult<Vec<BatchGetDocumentsResponse>> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::BatchGetDocuments(
            request.clone(),
            context.clone(),
        ));
        if let Some(error) = state.batch_get_failures.pop_front() {
            return Err(error);
        }
        let read_time = state.tick();
        let mut responses: Vec<_> = request
            .documents
            .iter()
            .map(|path| BatchGetDocumentsResponse {
                result: match state.documents.get(path) {
                    Some(doc) => BatchGetResult::Found(doc.clone()),
                    None => BatchGetResult::Missing(path.clone()),
                },
                read_time,
            })
            .collect();
        if state.reverse_batch_get {
            responses.reverse();
        }
        Ok(responses)
    }

    fn run_query(
        &self,
        request: &RunQueryRequest,
        context: &CallContext,
    ) -> RpcResult<Vec<RunQueryResponse>> {
        let mut state = self.state.lock();
        state
            .calls
            .push(RecordedCall::RunQuery(request.clone(), context.clone()));
        if let Some(response) = state.query_responses.pop_front() {
            return response;
        }
        let read_time = state.tick();
        let collection = request
            .parent
            .child(request.structured_query.collection_id.clone());
        Ok(state
            .documents
            .values()
            .filter(|doc| collection.is_parent_of(&doc.path))
            .map(|doc| RunQueryResponse {
                document: Some(doc.clone()),
                read_time,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag() -> RequestTag {
        RequestTag::from("tag")
    }

    #[test]
    fn mock_assigns_distinct_transaction_ids() {
        let transport = MockTransport::new();
        let request = BeginTransactionRequest::new("projects/p/databases/d");
        let ctx = CallContext::idempotent(tag());

        let first = transport.begin_transaction(&request, &ctx).unwrap();
        let second = transport.begin_transaction(&request, &ctx).unwrap();
        assert_ne!(first.transaction, second.transaction);
        assert_eq!(transport.begin_requests().len(), 2);
    }

    #[test]
    fn mock_scripted_failure_is_consumed_once() {
        let transport = MockTransport::new();
        transport.push_commit_response(Err(RpcError::aborted("contention")));
        let request = CommitRequest {
            database: "projects/p/databases/d".into(),
            writes: vec![],
            transaction: None,
        };
        let ctx = CallContext::once(tag());

        assert!(transport.commit(&request, &ctx).is_err());
        assert!(transport.commit(&request, &ctx).is_ok());
        assert_eq!(transport.methods(), vec![RpcMethod::Commit, RpcMethod::Commit]);
        assert!(!transport.calls()[0].context().idempotent);
    }

    #[test]
    fn mock_serves_documents() {
        let transport = MockTransport::new();
        transport.insert_document(
            "users/alice",
            json!({"age": 30}).as_object().cloned().unwrap(),
        )
        .unwrap();
        let request = BatchGetDocumentsRequest {
            database: "projects/p/databases/d".into(),
            documents: vec![
                ResourcePath::parse("users/alice").unwrap(),
                ResourcePath::parse("users/bob").unwrap(),
            ],
            mask: None,
            transaction: None,
        };

        let responses = transport
            .batch_get_documents(&request, &CallContext::idempotent(tag()))
            .unwrap();
        assert!(matches!(responses[0].result, BatchGetResult::Found(_)));
        assert!(matches!(responses[1].result, BatchGetResult::Missing(_)));
    }

    #[test]
    fn mock_refuses_non_document_paths() {
        let transport = MockTransport::new();
        let fields = json!({"age": 30}).as_object().cloned().unwrap();
        assert!(transport.insert_document("users", fields.clone()).is_err());
        assert!(transport.insert_document("", fields).is_err());
        assert!(transport.calls().is_empty());
    }
}
