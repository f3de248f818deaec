//! Request handlers for the transaction RPCs.

use crate::config::EmulatorConfig;
use crate::error::{EmulatorError, EmulatorResult};
use crate::query;
use crate::store::DocumentStore;
use docstore_protocol::{
    field_value, set_field_value, BatchGetDocumentsRequest, BatchGetDocumentsResponse,
    BatchGetResult, BeginTransactionRequest, BeginTransactionResponse, CommitRequest,
    CommitResponse, Document, DocumentData, DocumentMask, ResourcePath, RollbackRequest, RpcCode,
    RunQueryRequest, RunQueryResponse, TransactionId,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Shared state behind the handlers.
pub struct HandlerContext {
    /// Emulator configuration.
    pub config: EmulatorConfig,
    database: String,
    state: Mutex<EmulatorState>,
}

#[derive(Default)]
struct EmulatorState {
    store: DocumentStore,
    transactions: HashMap<TransactionId, OpenTransaction>,
    begin_requests: Vec<BeginTransactionRequest>,
    injected_commit_failures: VecDeque<RpcCode>,
}

/// Versions observed by a transaction's reads; `None` means missing.
#[derive(Debug, Default)]
struct OpenTransaction {
    read_set: HashMap<ResourcePath, Option<u64>>,
}

impl OpenTransaction {
    fn observe(&mut self, path: &ResourcePath, version: Option<u64>) {
        // The first observation is the one the commit must still see
        self.read_set.entry(path.clone()).or_insert(version);
    }
}

impl HandlerContext {
    /// Creates a new handler context with an empty store.
    pub fn new(config: EmulatorConfig) -> Self {
        let database = config.database_name();
        Self {
            config,
            database,
            state: Mutex::new(EmulatorState::default()),
        }
    }

    /// Returns the served database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Writes a document outside any transaction.
    pub fn put_document(&self, path: ResourcePath, fields: DocumentData) {
        self.state.lock().store.put(path, fields);
    }

    /// Returns a document.
    pub fn document(&self, path: &ResourcePath) -> Option<Document> {
        self.state
            .lock()
            .store
            .get(path)
            .map(|doc| doc.to_document(path))
    }

    /// Returns the number of stored documents.
    pub fn document_count(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Returns the number of open transactions.
    pub fn open_transactions(&self) -> usize {
        self.state.lock().transactions.len()
    }

    /// Returns every `beginTransaction` request received.
    pub fn begin_requests(&self) -> Vec<BeginTransactionRequest> {
        self.state.lock().begin_requests.clone()
    }

    /// Makes the next commit fail with `code`.
    pub fn inject_commit_failure(&self, code: RpcCode) {
        self.state.lock().injected_commit_failures.push_back(code);
    }

    fn check_database(&self, database: &str) -> EmulatorResult<()> {
        if database != self.database {
            return Err(EmulatorError::WrongDatabase {
                expected: self.database.clone(),
                actual: database.to_string(),
            });
        }
        Ok(())
    }
}

/// Handler for transaction RPCs.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles `beginTransaction`.
    ///
    /// A retry marker closes the transaction it names, if still open.
    pub fn handle_begin(
        &self,
        request: &BeginTransactionRequest,
    ) -> EmulatorResult<BeginTransactionResponse> {
        self.context.check_database(&request.database)?;

        let mut state = self.context.state.lock();
        state.begin_requests.push(request.clone());
        if let Some(previous) = request.retry_marker() {
            state.transactions.remove(previous);
        }

        let transaction = TransactionId::from(Uuid::new_v4().as_bytes().as_slice());
        state
            .transactions
            .insert(transaction.clone(), OpenTransaction::default());
        debug!(
            %transaction,
            retry = request.retry_marker().is_some(),
            "emulator began transaction"
        );
        Ok(BeginTransactionResponse { transaction })
    }

    /// Handles `commit`.
    ///
    /// Transactional commits are validated against the read set first; a
    /// failed commit leaves the transaction open.
    pub fn handle_commit(&self, request: &CommitRequest) -> EmulatorResult<CommitResponse> {
        self.context.check_database(&request.database)?;
        if request.writes.len() > self.context.config.max_writes_per_commit {
            return Err(EmulatorError::InvalidRequest(format!(
                "too many writes: {} > {}",
                request.writes.len(),
                self.context.config.max_writes_per_commit
            )));
        }
        for write in &request.writes {
            if !write.document.is_document() {
                return Err(EmulatorError::InvalidRequest(format!(
                    "{} is not a document path",
                    write.document
                )));
            }
        }

        let mut guard = self.context.state.lock();
        let state = &mut *guard;

        if let Some(transaction) = &request.transaction {
            let open = state
                .transactions
                .get(transaction)
                .ok_or_else(|| EmulatorError::UnknownTransaction(transaction.clone()))?;
            if let Some(code) = state.injected_commit_failures.pop_front() {
                return Err(EmulatorError::Injected(code));
            }
            for (path, observed) in &open.read_set {
                if state.store.version(path) != *observed {
                    debug!(%transaction, %path, "emulator aborting commit");
                    return Err(EmulatorError::Contention {
                        transaction: transaction.clone(),
                        path: path.clone(),
                    });
                }
            }
        } else if let Some(code) = state.injected_commit_failures.pop_front() {
            return Err(EmulatorError::Injected(code));
        }

        let (write_results, commit_time) = state.store.apply(&request.writes)?;
        if let Some(transaction) = &request.transaction {
            state.transactions.remove(transaction);
        }
        debug!(writes = write_results.len(), %commit_time, "emulator committed");
        Ok(CommitResponse {
            write_results,
            commit_time: Some(commit_time),
        })
    }

    /// Handles `rollback`.
    pub fn handle_rollback(&self, request: &RollbackRequest) -> EmulatorResult<()> {
        self.context.check_database(&request.database)?;
        let mut state = self.context.state.lock();
        if state.transactions.remove(&request.transaction).is_none() {
            return Err(EmulatorError::UnknownTransaction(request.transaction.clone()));
        }
        debug!(transaction = %request.transaction, "emulator rolled back");
        Ok(())
    }

    /// Handles `batchGet`. Results follow request order.
    pub fn handle_batch_get(
        &self,
        request: &BatchGetDocumentsRequest,
    ) -> EmulatorResult<Vec<BatchGetDocumentsResponse>> {
        self.context.check_database(&request.database)?;
        if request.documents.len() > self.context.config.max_batch_get {
            return Err(EmulatorError::InvalidRequest(format!(
                "too many documents: {} > {}",
                request.documents.len(),
                self.context.config.max_batch_get
            )));
        }
        if let Some(path) = request.documents.iter().find(|p| !p.is_document()) {
            return Err(EmulatorError::InvalidRequest(format!(
                "{path} is not a document path"
            )));
        }

        let mut guard = self.context.state.lock();
        let state = &mut *guard;
        let mut open = match &request.transaction {
            Some(transaction) => Some(
                state
                    .transactions
                    .get_mut(transaction)
                    .ok_or_else(|| EmulatorError::UnknownTransaction(transaction.clone()))?,
            ),
            None => None,
        };

        let read_time = state.store.now();
        let responses = request
            .documents
            .iter()
            .map(|path| {
                let stored = state.store.get(path);
                if let Some(open) = open.as_deref_mut() {
                    open.observe(path, stored.map(|doc| doc.version));
                }
                let result = match stored {
                    Some(doc) => {
                        let mut document = doc.to_document(path);
                        if let Some(mask) = &request.mask {
                            document.fields = apply_mask(&document.fields, mask);
                        }
                        BatchGetResult::Found(document)
                    }
                    None => BatchGetResult::Missing(path.clone()),
                };
                BatchGetDocumentsResponse { result, read_time }
            })
            .collect();
        Ok(responses)
    }

    /// Handles `runQuery`.
    ///
    /// An empty result still carries one element with the read time.
    pub fn handle_run_query(&self, request: &RunQueryRequest) -> EmulatorResult<Vec<RunQueryResponse>> {
        self.context.check_database(&request.database)?;
        if request.parent.is_collection() {
            return Err(EmulatorError::InvalidRequest(format!(
                "query parent {} is not a document or the root",
                request.parent
            )));
        }

        let mut guard = self.context.state.lock();
        let state = &mut *guard;
        let mut open = match &request.transaction {
            Some(transaction) => Some(
                state
                    .transactions
                    .get_mut(transaction)
                    .ok_or_else(|| EmulatorError::UnknownTransaction(transaction.clone()))?,
            ),
            None => None,
        };

        let read_time = state.store.now();
        let results = query::run_query(&state.store, &request.parent, &request.structured_query);
        if results.is_empty() {
            return Ok(vec![RunQueryResponse {
                document: None,
                read_time,
            }]);
        }

        Ok(results
            .into_iter()
            .map(|(path, doc)| {
                if let Some(open) = open.as_deref_mut() {
                    open.observe(path, Some(doc.version));
                }
                RunQueryResponse {
                    document: Some(doc.to_document(path)),
                    read_time,
                }
            })
            .collect())
    }
}

fn apply_mask(fields: &DocumentData, mask: &DocumentMask) -> DocumentData {
    let mut masked = DocumentData::new();
    for path in &mask.field_paths {
        if let Some(value) = field_value(fields, path) {
            set_field_value(&mut masked, path, value.clone());
        }
    }
    masked
}
