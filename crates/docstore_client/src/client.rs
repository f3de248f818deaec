//! Client handle shared by transactions and standalone operations.

use crate::config::ClientConfig;
use crate::document_group::DocumentGroup;
use crate::error::{TransactionError, TxnResult};
use crate::reference::{CollectionReference, DocumentReference};
use crate::request_tag::RequestTag;
use crate::runner::TransactionRunner;
use crate::snapshot::DocumentSnapshot;
use crate::transaction::Transaction;
use crate::transport::{CallContext, Transport};
use crate::write_batch::WriteBatch;
use docstore_protocol::{CommitResponse, ResourcePath};
use std::sync::Arc;

/// Entry point for references, batches and transactions against one database.
///
/// Cloning is cheap; clones share the configuration and the transport.
pub struct Client<T: Transport> {
    config: Arc<ClientConfig>,
    database: Arc<str>,
    transport: Arc<T>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            database: Arc::clone(&self.database),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client owning `transport`.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    /// Creates a client over a transport shared with other owners.
    pub fn with_shared_transport(config: ClientConfig, transport: Arc<T>) -> Self {
        let database: Arc<str> = config.database_name().to_string().into();
        Self {
            config: Arc::new(config),
            database,
            transport,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the fully qualified database name.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub(crate) fn database(&self) -> Arc<str> {
        Arc::clone(&self.database)
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a reference to the document at `path` (e.g. `users/alice`).
    pub fn doc(&self, path: &str) -> TxnResult<DocumentReference> {
        let path = ResourcePath::parse_document(path)?;
        Ok(DocumentReference::new(self.database(), path))
    }

    /// Returns a reference to the collection at `path` (e.g. `users`).
    pub fn collection(&self, path: &str) -> TxnResult<CollectionReference> {
        let path = ResourcePath::parse_collection(path)?;
        Ok(CollectionReference::new(self.database(), path))
    }

    /// Reads documents outside any transaction.
    pub fn get_all(&self, documents: &[DocumentReference]) -> TxnResult<Vec<DocumentSnapshot>> {
        let group = DocumentGroup::new(documents);
        group.validate(self.database_name())?;
        let context = CallContext::idempotent(RequestTag::generate());
        group
            .fetch(self.transport(), self.database_name(), &context)
            .map_err(TransactionError::Read)
    }

    /// Returns an empty write batch for a standalone commit.
    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.database())
    }

    /// Commits a standalone write batch.
    pub fn commit_batch(&self, batch: WriteBatch) -> TxnResult<CommitResponse> {
        let context = CallContext::once(RequestTag::generate());
        batch
            .commit(self.transport(), None, &context)
            .map_err(TransactionError::Commit)
    }

    /// Starts a fresh, unbegun transaction attempt.
    pub fn transaction(&self) -> Transaction<T> {
        Transaction::new(self.clone())
    }

    /// Runs `f` in a transaction, retrying contended commits.
    ///
    /// See [`TransactionRunner::run`].
    pub fn run_transaction<R, F>(&self, f: F) -> TxnResult<R>
    where
        F: FnMut(&mut Transaction<T>) -> TxnResult<R>,
    {
        TransactionRunner::new(self.clone()).run(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::write_batch::SetOptions;
    use docstore_protocol::RpcMethod;
    use serde_json::json;

    fn client() -> Client<MockTransport> {
        Client::new(
            ClientConfig::new("p", "").with_database_id("d"),
            MockTransport::new(),
        )
    }

    #[test]
    fn references_carry_the_database_name() {
        let client = client();
        let alice = client.doc("users/alice").unwrap();
        assert_eq!(alice.database(), "projects/p/databases/d");
        assert_eq!(client.collection("users").unwrap(), alice.parent());
        assert!(client.doc("users").is_err());
        assert!(client.collection("users/alice").is_err());
    }

    #[test]
    fn standalone_reads_use_no_transaction() {
        let client = client();
        client
            .transport()
            .insert_document("users/a", json!({"n": 1}).as_object().cloned().unwrap())
            .unwrap();

        let refs = [client.doc("users/a").unwrap()];
        let snapshots = client.get_all(&refs).unwrap();
        assert!(snapshots[0].exists());
        assert_eq!(client.transport().batch_get_requests()[0].transaction, None);
    }

    #[test]
    fn standalone_reads_validate_input() {
        let client = client();
        let other = Client::new(
            ClientConfig::new("other", "").with_database_id("d"),
            MockTransport::new(),
        );

        let err = client.get_all(&[]).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidArgument { .. }));

        let refs = [other.doc("users/a").unwrap(), client.doc("users/b").unwrap()];
        let err = client.get_all(&refs).unwrap_err();
        assert!(matches!(err, TransactionError::InvalidArgument { .. }));
        assert!(err.to_string().contains("index 0"));
        assert!(client.transport().methods().is_empty());
    }

    #[test]
    fn standalone_batch_commits_once() {
        let client = client();
        let mut batch = client.batch();
        batch
            .set(
                &client.doc("users/a").unwrap(),
                json!({"n": 1}).as_object().cloned().unwrap(),
                SetOptions::merge(),
            )
            .unwrap();

        client.commit_batch(batch).unwrap();
        assert_eq!(client.transport().methods(), vec![RpcMethod::Commit]);
        let calls = client.transport().calls();
        assert!(!calls[0].context().idempotent);
    }
}
