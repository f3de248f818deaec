//! The emulator server.

use crate::config::EmulatorConfig;
use crate::error::{EmulatorError, EmulatorResult};
use crate::handler::{HandlerContext, RequestHandler};
use docstore_protocol::{
    decode, encode_reply, BatchGetDocumentsRequest, BatchGetDocumentsResponse,
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse, Document,
    DocumentData, ResourcePath, RollbackRequest, RpcCode, RpcError, RpcMethod, RpcResult,
    RunQueryRequest, RunQueryResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// An in-process DocStore server.
///
/// Calls can be made directly (`begin_transaction`, `commit`, ...) or as
/// CBOR bodies routed by URL path with [`handle_path`](Self::handle_path),
/// which is what a loopback HTTP client needs.
///
/// # Example
///
/// ```
/// use docstore_emulator::{EmulatorConfig, EmulatorServer};
/// use docstore_protocol::BeginTransactionRequest;
///
/// let server = EmulatorServer::new(EmulatorConfig::new("demo", "(default)"));
/// let request = BeginTransactionRequest::new(server.database());
/// let response = server.begin_transaction(&request).unwrap();
/// assert_eq!(server.open_transactions(), 1);
/// # let _ = response;
/// ```
pub struct EmulatorServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl EmulatorServer {
    /// Creates a new emulator with an empty store.
    pub fn new(config: EmulatorConfig) -> Self {
        let context = Arc::new(HandlerContext::new(config));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the served database name.
    pub fn database(&self) -> &str {
        self.context.database()
    }

    /// Handles a `beginTransaction` request.
    pub fn begin_transaction(
        &self,
        request: &BeginTransactionRequest,
    ) -> RpcResult<BeginTransactionResponse> {
        self.handler.handle_begin(request).map_err(RpcError::from)
    }

    /// Handles a `commit` request.
    pub fn commit(&self, request: &CommitRequest) -> RpcResult<CommitResponse> {
        self.handler.handle_commit(request).map_err(RpcError::from)
    }

    /// Handles a `rollback` request.
    pub fn rollback(&self, request: &RollbackRequest) -> RpcResult<()> {
        self.handler.handle_rollback(request).map_err(RpcError::from)
    }

    /// Handles a `batchGet` request.
    pub fn batch_get_documents(
        &self,
        request: &BatchGetDocumentsRequest,
    ) -> RpcResult<Vec<BatchGetDocumentsResponse>> {
        self.handler.handle_batch_get(request).map_err(RpcError::from)
    }

    /// Handles a `runQuery` request.
    pub fn run_query(&self, request: &RunQueryRequest) -> RpcResult<Vec<RunQueryResponse>> {
        self.handler.handle_run_query(request).map_err(RpcError::from)
    }

    /// Decodes a CBOR request body, dispatches it and encodes the reply.
    ///
    /// Undecodable bodies produce an `InvalidArgument` reply; only a reply
    /// that cannot be encoded is an `Err`.
    pub fn handle_rpc(&self, method: RpcMethod, body: &[u8]) -> Result<Vec<u8>, String> {
        debug!(method = method.as_str(), bytes = body.len(), "emulator rpc");
        match method {
            RpcMethod::BeginTransaction => reply(body, |r| self.begin_transaction(&r)),
            RpcMethod::Commit => reply(body, |r| self.commit(&r)),
            RpcMethod::Rollback => reply(body, |r| self.rollback(&r)),
            RpcMethod::BatchGetDocuments => reply(body, |r| self.batch_get_documents(&r)),
            RpcMethod::RunQuery => reply(body, |r| self.run_query(&r)),
        }
    }

    /// Routes `/v1/{database}/documents:{method}` to [`handle_rpc`](Self::handle_rpc).
    pub fn handle_path(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        let (database, method) = path
            .strip_prefix("/v1/")
            .and_then(|rest| rest.rsplit_once("/documents:"))
            .ok_or_else(|| format!("no such endpoint: {path}"))?;
        let method =
            RpcMethod::from_name(method).ok_or_else(|| format!("unknown method: {method}"))?;

        if database != self.database() {
            let err = EmulatorError::WrongDatabase {
                expected: self.database().to_string(),
                actual: database.to_string(),
            };
            return encode_reply::<()>(&Err(err.into())).map_err(|e| e.to_string());
        }
        self.handle_rpc(method, body)
    }

    /// Writes a document outside any transaction.
    pub fn put_document(&self, path: &str, fields: DocumentData) -> EmulatorResult<()> {
        let path = ResourcePath::parse_document(path)
            .map_err(|e| EmulatorError::InvalidRequest(e.to_string()))?;
        self.context.put_document(path, fields);
        Ok(())
    }

    /// Returns a document, if it exists.
    pub fn document(&self, path: &str) -> Option<Document> {
        let path = ResourcePath::parse_document(path).ok()?;
        self.context.document(&path)
    }

    /// Returns the number of stored documents.
    pub fn document_count(&self) -> usize {
        self.context.document_count()
    }

    /// Returns the number of open transactions.
    pub fn open_transactions(&self) -> usize {
        self.context.open_transactions()
    }

    /// Returns every `beginTransaction` request received.
    pub fn begin_requests(&self) -> Vec<BeginTransactionRequest> {
        self.context.begin_requests()
    }

    /// Makes the next commit fail with `code`.
    pub fn inject_commit_failure(&self, code: RpcCode) {
        self.context.inject_commit_failure(code);
    }
}

impl Default for EmulatorServer {
    fn default() -> Self {
        Self::new(EmulatorConfig::default())
    }
}

fn reply<Req, Res, F>(body: &[u8], f: F) -> Result<Vec<u8>, String>
where
    Req: DeserializeOwned,
    Res: Serialize,
    F: FnOnce(Req) -> RpcResult<Res>,
{
    let result = match decode::<Req>(body) {
        Ok(request) => f(request),
        Err(e) => Err(EmulatorError::from(e).into()),
    };
    encode_reply(&result).map_err(|e| e.to_string())
}
