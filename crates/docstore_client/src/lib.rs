//! # DocStore Client
//!
//! Client-side transaction coordinator for a remote DocStore database.
//!
//! This crate provides:
//! - `Transaction`: one attempt of the begin → read → write → commit protocol
//! - `TransactionRunner`: runs a user function in a transaction, retrying
//!   contended commits with a fresh attempt
//! - `WriteBatch` and `DocumentGroup`: buffered writes and batched reads
//! - Document/collection references, queries and snapshots
//! - A `Transport` seam with mock and HTTP/CBOR implementations
//!
//! ## Protocol
//!
//! 1. `begin` obtains a server transaction id (retrying attempts name the
//!    transaction they replace)
//! 2. Reads are sent immediately and tagged with the transaction id
//! 3. Writes are buffered locally
//! 4. `commit` sends all buffered writes atomically, or `rollback` drops them
//!
//! ## Key Invariants
//!
//! - All reads happen before any write on an attempt
//! - The transaction id is assigned once, by a successful `begin`
//! - A retry keeps the request tag and starts with an empty write batch
//! - Commit and rollback are never re-sent by the transport

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod document_group;
mod error;
mod http;
mod reference;
mod request_tag;
mod runner;
mod snapshot;
mod transaction;
mod transport;
mod write_batch;

pub use client::Client;
pub use config::{ClientConfig, RetryConfig};
pub use document_group::DocumentGroup;
pub use error::{TransactionError, TxnResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer};
pub use reference::{CollectionReference, DocumentReference, Query, ReadTarget};
pub use request_tag::RequestTag;
pub use runner::TransactionRunner;
pub use snapshot::{DocumentSnapshot, QuerySnapshot, ReadResult};
pub use transaction::{AttemptState, Phase, RetryContext, Transaction};
pub use transport::{CallContext, MockTransport, RecordedCall, Transport};
pub use write_batch::{SetOptions, WriteBatch};

pub use docstore_protocol::{
    CommitResponse, Direction, DocumentData, DocumentMask, FieldPath, FilterOp, Precondition,
    RpcCode, RpcError, Timestamp, TransactionId, Value, WriteResult,
};
