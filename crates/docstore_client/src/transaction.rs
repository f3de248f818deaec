//! The transaction coordinator.
//!
//! A [`Transaction`] is one attempt of the protocol:
//!
//! ```text
//! Pending ──begin──> Active ──commit──> Committed
//!    │                 │  └──commit──> CommitFailed ──rollback──> RolledBack
//!    │                 └──rollback──────────────────────────────> RolledBack
//!    └──rollback (local)─────────────────────────────────────────> RolledBack
//! ```
//!
//! Independently of the attempt state, the phase moves one way from
//! `Reading` to `Writing` when the first write is buffered. Reads are
//! refused in the `Writing` phase.

use crate::client::Client;
use crate::document_group::DocumentGroup;
use crate::error::{TransactionError, TxnResult};
use crate::reference::{DocumentReference, Query, ReadTarget};
use crate::request_tag::RequestTag;
use crate::snapshot::{DocumentSnapshot, QuerySnapshot, ReadResult};
use crate::transport::{CallContext, Transport};
use crate::write_batch::{SetOptions, WriteBatch};
use docstore_protocol::{
    BeginTransactionRequest, CommitResponse, DocumentData, DocumentMask, Precondition,
    RollbackRequest, RpcError, TransactionId, Value,
};
use tracing::debug;

/// Whether an attempt may still read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No write buffered yet; reads allowed.
    Reading,
    /// At least one write buffered; reads refused.
    Writing,
}

/// Lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Created, no transaction id yet.
    Pending,
    /// `begin` succeeded.
    Active,
    /// Commit succeeded.
    Committed,
    /// Commit was sent and failed. Only `rollback` is still accepted.
    CommitFailed,
    /// Rolled back.
    RolledBack,
}

impl AttemptState {
    /// Returns true if no further operation (other than a rollback after a
    /// failed commit) is accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Committed | AttemptState::CommitFailed | AttemptState::RolledBack
        )
    }
}

/// What a retry attempt inherits from the attempt it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    /// Request tag of the logical transaction.
    pub request_tag: RequestTag,
    /// Id of the failed attempt, sent as the retry marker on `begin`.
    pub previous_transaction_id: Option<TransactionId>,
}

/// One attempt of a read-write transaction.
pub struct Transaction<T: Transport> {
    client: Client<T>,
    batch: WriteBatch,
    request_tag: RequestTag,
    retry_from: Option<TransactionId>,
    transaction_id: Option<TransactionId>,
    phase: Phase,
    state: AttemptState,
}

impl<T: Transport> std::fmt::Debug for Transaction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("batch", &self.batch)
            .field("request_tag", &self.request_tag)
            .field("retry_from", &self.retry_from)
            .field("transaction_id", &self.transaction_id)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Transaction<T> {
    /// Creates a fresh attempt with a new request tag.
    pub fn new(client: Client<T>) -> Self {
        Self::build(client, RequestTag::generate(), None)
    }

    /// Creates an attempt that retries the one described by `context`.
    ///
    /// The request tag is inherited and the write batch starts empty.
    pub fn with_retry(client: Client<T>, context: RetryContext) -> Self {
        Self::build(client, context.request_tag, context.previous_transaction_id)
    }

    fn build(client: Client<T>, request_tag: RequestTag, retry_from: Option<TransactionId>) -> Self {
        let batch = WriteBatch::new(client.database());
        Self {
            client,
            batch,
            request_tag,
            retry_from,
            transaction_id: None,
            phase: Phase::Reading,
            state: AttemptState::Pending,
        }
    }

    /// Returns the request tag shared by every RPC of this transaction.
    pub fn request_tag(&self) -> &RequestTag {
        &self.request_tag
    }

    /// Returns the server transaction id, once `begin` has succeeded.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the attempt state.
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Returns the number of buffered writes.
    pub fn write_count(&self) -> usize {
        self.batch.len()
    }

    /// Builds the context for an attempt that retries this one.
    pub fn retry_context(&self) -> RetryContext {
        RetryContext {
            request_tag: self.request_tag.clone(),
            previous_transaction_id: self.transaction_id.clone(),
        }
    }

    /// Obtains a transaction id from the server.
    pub fn begin(&mut self) -> TxnResult<()> {
        match self.state {
            AttemptState::Pending => {}
            AttemptState::Active => return Err(TransactionError::AlreadyBegun),
            state => return Err(TransactionError::Finished { state }),
        }

        let database = self.client.database_name().to_string();
        let request = match &self.retry_from {
            Some(previous) => BeginTransactionRequest::retrying(database, previous.clone()),
            None => BeginTransactionRequest::new(database),
        };
        let response = self
            .client
            .transport()
            .begin_transaction(&request, &self.call_context(true))
            .map_err(TransactionError::Begin)?;

        debug!(
            request_tag = %self.request_tag,
            transaction = %response.transaction,
            retry = self.retry_from.is_some(),
            "transaction begun"
        );
        self.transaction_id = Some(response.transaction);
        self.state = AttemptState::Active;
        Ok(())
    }

    /// Reads a document or runs a query.
    pub fn get(&mut self, target: impl Into<ReadTarget>) -> TxnResult<ReadResult> {
        match target.into() {
            ReadTarget::Document(doc) => self.get_document(&doc).map(ReadResult::Document),
            ReadTarget::Query(query) => self.get_query(&query).map(ReadResult::Query),
        }
    }

    /// Reads a single document.
    pub fn get_document(&mut self, doc: &DocumentReference) -> TxnResult<DocumentSnapshot> {
        let mut snapshots = self.get_all(std::slice::from_ref(doc))?;
        snapshots
            .pop()
            .ok_or_else(|| TransactionError::Read(RpcError::internal("empty batch get result")))
    }

    /// Runs a query inside the transaction. Requires a prior `begin`.
    pub fn get_query(&mut self, query: &Query) -> TxnResult<QuerySnapshot> {
        self.ensure_reading()?;
        self.check_database(query.database(), "query")?;
        let Some(transaction) = self.transaction_id.clone() else {
            return Err(TransactionError::NotBegun { operation: "query" });
        };

        let responses = self
            .client
            .transport()
            .run_query(&query.to_request(Some(transaction)), &self.call_context(true))
            .map_err(TransactionError::Read)?;

        let read_time = responses.first().map(|r| r.read_time);
        let docs: Vec<_> = responses
            .into_iter()
            .filter_map(|response| {
                let read_time = response.read_time;
                response.document.map(|doc| {
                    let reference = query.document_reference(doc.path.clone());
                    DocumentSnapshot::found(reference, doc, read_time)
                })
            })
            .collect();
        debug!(request_tag = %self.request_tag, results = docs.len(), "query read");
        Ok(QuerySnapshot::new(query.clone(), docs, read_time))
    }

    /// Reads several documents; results line up with `documents` by position.
    pub fn get_all(&mut self, documents: &[DocumentReference]) -> TxnResult<Vec<DocumentSnapshot>> {
        self.get_all_with_mask(documents, None)
    }

    /// Like [`get_all`](Self::get_all), returning only the fields in `mask`.
    pub fn get_all_with_mask(
        &mut self,
        documents: &[DocumentReference],
        mask: Option<DocumentMask>,
    ) -> TxnResult<Vec<DocumentSnapshot>> {
        self.ensure_reading()?;
        let group = DocumentGroup::new(documents);
        group.validate(self.client.database_name())?;

        let snapshots = group
            .with_mask(mask)
            .in_transaction(self.transaction_id.clone())
            .fetch(
                self.client.transport(),
                self.client.database_name(),
                &self.call_context(true),
            )
            .map_err(TransactionError::Read)?;
        debug!(request_tag = %self.request_tag, documents = snapshots.len(), "documents read");
        Ok(snapshots)
    }

    /// Buffers the creation of a document that must not exist yet.
    pub fn create(&mut self, doc: &DocumentReference, data: DocumentData) -> TxnResult<&mut Self> {
        self.buffer(|batch| batch.create(doc, data).map(drop))
    }

    /// Buffers an overwrite of a document.
    pub fn set(&mut self, doc: &DocumentReference, data: DocumentData) -> TxnResult<&mut Self> {
        self.set_with_options(doc, data, SetOptions::overwrite())
    }

    /// Buffers a set, optionally merging into the existing document.
    pub fn set_with_options(
        &mut self,
        doc: &DocumentReference,
        data: DocumentData,
        options: SetOptions,
    ) -> TxnResult<&mut Self> {
        self.buffer(|batch| batch.set(doc, data, options).map(drop))
    }

    /// Buffers an update of existing fields. Keys are dotted field paths.
    pub fn update<I, K, V>(&mut self, doc: &DocumentReference, fields: I) -> TxnResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.update_with_precondition(doc, fields, None)
    }

    /// Buffers an update with an explicit precondition.
    pub fn update_with_precondition<I, K, V>(
        &mut self,
        doc: &DocumentReference,
        fields: I,
        precondition: Option<Precondition>,
    ) -> TxnResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.buffer(|batch| batch.update(doc, fields, precondition).map(drop))
    }

    /// Buffers an update of a single field.
    pub fn update_field(
        &mut self,
        doc: &DocumentReference,
        field: &str,
        value: impl Into<Value>,
    ) -> TxnResult<&mut Self> {
        let value: Value = value.into();
        self.update(doc, [(field, value)])
    }

    /// Buffers a delete.
    pub fn delete(&mut self, doc: &DocumentReference) -> TxnResult<&mut Self> {
        self.delete_with_precondition(doc, None)
    }

    /// Buffers a delete with an optional precondition.
    pub fn delete_with_precondition(
        &mut self,
        doc: &DocumentReference,
        precondition: Option<Precondition>,
    ) -> TxnResult<&mut Self> {
        self.buffer(|batch| batch.delete(doc, precondition).map(drop))
    }

    /// Sends all buffered writes atomically.
    ///
    /// The attempt is terminal afterwards whatever the outcome; after a
    /// failure only [`rollback`](Self::rollback) is accepted.
    pub fn commit(&mut self) -> TxnResult<CommitResponse> {
        match self.state {
            AttemptState::Active => {}
            AttemptState::Pending => return Err(TransactionError::NotBegun { operation: "commit" }),
            state => return Err(TransactionError::Finished { state }),
        }
        let Some(transaction) = self.transaction_id.clone() else {
            return Err(TransactionError::NotBegun { operation: "commit" });
        };

        let batch = std::mem::replace(&mut self.batch, WriteBatch::new(self.client.database()));
        let writes = batch.len();
        let context = self.call_context(false);
        match batch.commit(self.client.transport(), Some(transaction), &context) {
            Ok(response) => {
                self.state = AttemptState::Committed;
                debug!(request_tag = %self.request_tag, writes, "transaction committed");
                Ok(response)
            }
            Err(status) => {
                self.state = AttemptState::CommitFailed;
                debug!(request_tag = %self.request_tag, %status, "commit failed");
                Err(TransactionError::Commit(status))
            }
        }
    }

    /// Abandons the attempt and releases server-side resources.
    ///
    /// An attempt that never began is rolled back locally.
    pub fn rollback(&mut self) -> TxnResult<()> {
        match self.state {
            AttemptState::Pending | AttemptState::Active | AttemptState::CommitFailed => {}
            state => return Err(TransactionError::Finished { state }),
        }
        self.state = AttemptState::RolledBack;
        self.batch = WriteBatch::new(self.client.database());

        let Some(transaction) = self.transaction_id.clone() else {
            return Ok(());
        };
        let request = RollbackRequest {
            database: self.client.database_name().to_string(),
            transaction,
        };
        self.client
            .transport()
            .rollback(&request, &self.call_context(false))
            .map_err(TransactionError::Rollback)?;
        debug!(request_tag = %self.request_tag, "transaction rolled back");
        Ok(())
    }

    fn ensure_open(&self) -> TxnResult<()> {
        if self.state.is_terminal() {
            return Err(TransactionError::Finished { state: self.state });
        }
        Ok(())
    }

    fn ensure_reading(&self) -> TxnResult<()> {
        self.ensure_open()?;
        if self.phase == Phase::Writing {
            return Err(TransactionError::ReadAfterWrite);
        }
        Ok(())
    }

    fn buffer<F>(&mut self, op: F) -> TxnResult<&mut Self>
    where
        F: FnOnce(&mut WriteBatch) -> TxnResult<()>,
    {
        self.ensure_open()?;
        op(&mut self.batch)?;
        if self.phase == Phase::Reading {
            debug!(request_tag = %self.request_tag, "transaction entered write phase");
            self.phase = Phase::Writing;
        }
        Ok(self)
    }

    fn check_database(&self, database: &str, what: &str) -> TxnResult<()> {
        if database != self.client.database_name() {
            return Err(TransactionError::invalid_argument(format!(
                "{what} belongs to {database}, not {}",
                self.client.database_name()
            )));
        }
        Ok(())
    }

    fn call_context(&self, idempotent: bool) -> CallContext {
        if idempotent {
            CallContext::idempotent(self.request_tag.clone())
        } else {
            CallContext::once(self.request_tag.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::MockTransport;
    use docstore_protocol::{RpcCode, RpcMethod, WriteKind};
    use proptest::prelude::*;
    use serde_json::json;

    fn client() -> Client<MockTransport> {
        Client::new(
            ClientConfig::new("p", "").with_database_id("d"),
            MockTransport::new(),
        )
    }

    fn data(value: serde_json::Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    fn begun(client: &Client<MockTransport>) -> Transaction<MockTransport> {
        let mut txn = client.transaction();
        txn.begin().unwrap();
        txn
    }

    #[test]
    fn fresh_attempt_begins_without_retry_marker() {
        let client = client();
        let txn = begun(&client);

        assert_eq!(txn.state(), AttemptState::Active);
        assert!(txn.transaction_id().is_some());
        let begin = &client.transport().begin_requests()[0];
        assert_eq!(begin.database, "projects/p/databases/d");
        assert!(begin.retry_marker().is_none());
        assert!(client.transport().calls()[0].context().idempotent);
    }

    #[test]
    fn retry_attempt_inherits_tag_and_sends_marker() {
        let client = client();
        let mut first = begun(&client);
        first.create(&client.doc("users/a").unwrap(), data(json!({"x": 1}))).unwrap();
        client.transport().push_commit_response(Err(RpcError::aborted("contention")));
        assert!(first.commit().unwrap_err().is_retryable());

        let mut second = Transaction::with_retry(client.clone(), first.retry_context());
        assert_eq!(second.request_tag(), first.request_tag());
        assert_eq!(second.write_count(), 0);
        assert_eq!(second.phase(), Phase::Reading);

        second.begin().unwrap();
        let begins = client.transport().begin_requests();
        assert_eq!(begins[1].retry_marker(), first.transaction_id());
        assert_ne!(second.transaction_id(), first.transaction_id());
    }

    #[test]
    fn read_after_create_is_refused() {
        let client = client();
        let mut txn = begun(&client);
        txn.create(&client.doc("users/a").unwrap(), data(json!({"x": 1}))).unwrap();

        let err = txn.get(client.doc("users/b").unwrap()).unwrap_err();
        assert!(matches!(err, TransactionError::ReadAfterWrite));
        assert!(!client.transport().methods().contains(&RpcMethod::BatchGetDocuments));
    }

    #[test]
    fn read_after_read_then_set_is_refused() {
        let client = client();
        let mut txn = begun(&client);
        let a = client.doc("users/a").unwrap();

        txn.get(a.clone()).unwrap();
        txn.set(&a, data(json!({"x": 2}))).unwrap();
        let err = txn.get_document(&client.doc("users/b").unwrap()).unwrap_err();
        assert!(matches!(err, TransactionError::ReadAfterWrite));

        let query = client.collection("users").unwrap().query();
        assert!(matches!(
            txn.get(query),
            Err(TransactionError::ReadAfterWrite)
        ));
    }

    #[test]
    fn get_all_preserves_positions() {
        let client = client();
        client.transport().insert_document("users/a", data(json!({"n": 1}))).unwrap();
        client.transport().insert_document("users/b", data(json!({"n": 2}))).unwrap();
        client.transport().set_reverse_batch_get(true);
        let mut txn = begun(&client);

        let refs = [
            client.doc("users/a").unwrap(),
            client.doc("users/b").unwrap(),
            client.doc("users/a").unwrap(),
        ];
        let snapshots = txn.get_all(&refs).unwrap();
        assert_eq!(snapshots.len(), 3);
        for (reference, snapshot) in refs.iter().zip(&snapshots) {
            assert_eq!(snapshot.reference(), reference);
        }
        assert_eq!(snapshots[2].get("n"), Some(&json!(1)));

        let request = &client.transport().batch_get_requests()[0];
        assert_eq!(request.transaction.as_ref(), txn.transaction_id());
    }

    #[test]
    fn single_get_matches_get_all() {
        let client = client();
        client.transport().insert_document("users/a", data(json!({"n": 1}))).unwrap();
        let mut txn = begun(&client);
        let a = client.doc("users/a").unwrap();

        let single = txn.get(a.clone()).unwrap().into_document().unwrap();
        let all = txn.get_all(std::slice::from_ref(&a)).unwrap();
        assert_eq!(single.data(), all[0].data());
        assert_eq!(single.reference(), all[0].reference());
    }

    #[test]
    fn get_all_validates_input() {
        let client = client();
        let other = Client::new(
            ClientConfig::new("other", "").with_database_id("d"),
            MockTransport::new(),
        );
        let mut txn = begun(&client);

        assert!(matches!(
            txn.get_all(&[]),
            Err(TransactionError::InvalidArgument { .. })
        ));
        let refs = [client.doc("users/a").unwrap(), other.doc("users/b").unwrap()];
        let err = txn.get_all(&refs).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn document_reads_before_begin_carry_no_transaction() {
        let client = client();
        let mut txn = client.transaction();
        txn.get_document(&client.doc("users/a").unwrap()).unwrap();
        assert_eq!(client.transport().batch_get_requests()[0].transaction, None);
    }

    #[test]
    fn query_before_begin_is_refused_locally() {
        let client = client();
        let mut txn = client.transaction();
        let query = client.collection("users").unwrap().query();

        let err = txn.get_query(&query).unwrap_err();
        assert!(matches!(err, TransactionError::NotBegun { operation: "query" }));
        assert!(client.transport().calls().is_empty());
    }

    #[test]
    fn query_runs_in_transaction() {
        let client = client();
        client.transport().insert_document("users/a", data(json!({"n": 1}))).unwrap();
        client.transport().insert_document("users/b", data(json!({"n": 2}))).unwrap();
        client.transport().insert_document("teams/x", data(json!({}))).unwrap();
        let mut txn = begun(&client);

        let query = client.collection("users").unwrap().query();
        let snapshot = txn.get(query).unwrap().into_query().unwrap();
        let ids: Vec<_> = snapshot.docs().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(snapshot.read_time().is_some());
    }

    #[test]
    fn update_without_fields_stays_in_reading_phase() {
        let client = client();
        let mut txn = begun(&client);
        let err = txn
            .update(&client.doc("users/a").unwrap(), Vec::<(&str, Value)>::new())
            .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidArgument { .. }));
        assert_eq!(txn.phase(), Phase::Reading);
        assert_eq!(txn.write_count(), 0);
    }

    #[test]
    fn commit_sends_buffered_writes_in_order() {
        let client = client();
        let mut txn = begun(&client);
        let a = client.doc("users/a").unwrap();
        let b = client.doc("users/b").unwrap();

        txn.create(&a, data(json!({"x": 1})))
            .unwrap()
            .update_field(&a, "x", 2)
            .unwrap()
            .delete(&b)
            .unwrap();
        let response = txn.commit().unwrap();
        assert_eq!(response.write_results.len(), 3);
        assert_eq!(txn.state(), AttemptState::Committed);

        let commit = &client.transport().commit_requests()[0];
        assert_eq!(commit.transaction.as_ref(), txn.transaction_id());
        assert_eq!(commit.writes.len(), 3);
        assert_eq!(commit.writes[0].precondition, Some(Precondition::Exists(false)));
        assert_eq!(commit.writes[1].kind, WriteKind::Update(data(json!({"x": 2}))));
        assert!(commit.writes[2].is_delete());

        let call = client.transport().calls().pop().unwrap();
        assert!(!call.context().idempotent);
        assert_eq!(&call.context().request_tag, txn.request_tag());
    }

    #[test]
    fn commit_before_begin_is_refused() {
        let client = client();
        let mut txn = client.transaction();
        assert!(matches!(
            txn.commit(),
            Err(TransactionError::NotBegun { operation: "commit" })
        ));
    }

    #[test]
    fn finished_attempts_refuse_operations() {
        let client = client();
        let mut txn = begun(&client);
        txn.commit().unwrap();

        let a = client.doc("users/a").unwrap();
        assert!(matches!(
            txn.get_document(&a),
            Err(TransactionError::Finished {
                state: AttemptState::Committed
            })
        ));
        assert!(txn.set(&a, DocumentData::new()).is_err());
        assert!(txn.commit().is_err());
        assert!(txn.rollback().is_err());
        assert!(matches!(txn.begin(), Err(TransactionError::Finished { .. })));
    }

    #[test]
    fn failed_commit_can_be_rolled_back() {
        let client = client();
        let mut txn = begun(&client);
        client
            .transport()
            .push_commit_response(Err(RpcError::new(RpcCode::FailedPrecondition, "stale")));

        let err = txn.commit().unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(txn.state(), AttemptState::CommitFailed);

        txn.rollback().unwrap();
        assert_eq!(txn.state(), AttemptState::RolledBack);
        let rollback = &client.transport().rollback_requests()[0];
        assert_eq!(Some(&rollback.transaction), txn.transaction_id());
    }

    #[test]
    fn rollback_of_unbegun_attempt_is_local() {
        let client = client();
        let mut txn = client.transaction();
        txn.rollback().unwrap();
        assert_eq!(txn.state(), AttemptState::RolledBack);
        assert!(client.transport().calls().is_empty());
    }

    #[test]
    fn rollback_failure_is_reported() {
        let client = client();
        let mut txn = begun(&client);
        client
            .transport()
            .push_rollback_response(Err(RpcError::unavailable("gone")));
        assert!(matches!(txn.rollback(), Err(TransactionError::Rollback(_))));
        assert_eq!(txn.state(), AttemptState::RolledBack);
    }

    #[test]
    fn begin_is_single_shot_but_retryable_after_failure() {
        let client = client();
        client
            .transport()
            .push_begin_response(Err(RpcError::unavailable("down")));
        let mut txn = client.transaction();

        assert!(matches!(txn.begin(), Err(TransactionError::Begin(_))));
        assert_eq!(txn.state(), AttemptState::Pending);
        assert!(txn.transaction_id().is_none());

        txn.begin().unwrap();
        assert!(matches!(txn.begin(), Err(TransactionError::AlreadyBegun)));
    }

    #[test]
    fn read_failures_surface_as_read_errors() {
        let client = client();
        client
            .transport()
            .push_batch_get_failure(RpcError::unavailable("down"));
        let mut txn = begun(&client);
        let err = txn.get_document(&client.doc("users/a").unwrap()).unwrap_err();
        assert_eq!(err.status().map(|s| s.code), Some(RpcCode::Unavailable));
    }

    proptest! {
        #[test]
        fn read_after_write_guard_is_monotonic(ops in proptest::collection::vec(any::<bool>(), 1..24)) {
            let client = client();
            let mut txn = begun(&client);
            let doc = client.doc("users/a").unwrap();
            let mut written = false;

            for is_write in ops {
                if is_write {
                    txn.update_field(&doc, "n", 1).unwrap();
                    written = true;
                } else {
                    let result = txn.get_document(&doc);
                    prop_assert_eq!(result.is_err(), written);
                    if written {
                        prop_assert!(matches!(result, Err(TransactionError::ReadAfterWrite)));
                    }
                }
                prop_assert_eq!(txn.phase() == Phase::Writing, written);
            }
        }

        #[test]
        fn get_all_is_positional(picks in proptest::collection::vec(0usize..4, 1..12)) {
            let client = client();
            client.transport().insert_document("users/u0", data(json!({"i": 0}))).unwrap();
            client.transport().insert_document("users/u2", data(json!({"i": 2}))).unwrap();
            client.transport().set_reverse_batch_get(true);
            let mut txn = begun(&client);

            let refs: Vec<_> = picks
                .iter()
                .map(|i| client.doc(&format!("users/u{i}")).unwrap())
                .collect();
            let snapshots = txn.get_all(&refs).unwrap();

            prop_assert_eq!(snapshots.len(), picks.len());
            for (pick, snapshot) in picks.iter().zip(&snapshots) {
                let expected = format!("u{pick}");
                prop_assert_eq!(snapshot.id(), expected.as_str());
                prop_assert_eq!(snapshot.exists(), pick % 2 == 0);
            }
        }
    }
}
