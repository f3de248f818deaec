//! # DocStore Protocol
//!
//! Wire types and CBOR codec for the DocStore transaction RPCs.
//!
//! This crate provides:
//! - Resource and field paths
//! - Document values, timestamps and opaque transaction ids
//! - Writes, preconditions and field masks
//! - Structured queries
//! - Request/response messages for begin, commit, rollback, batch get and
//!   run query
//! - RPC status codes
//! - CBOR encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod messages;
mod path;
mod query;
mod status;
mod value;
mod write;

pub use codec::{decode, decode_reply, encode, encode_reply};
pub use error::{CodecError, CodecResult, PathError};
pub use messages::{
    BatchGetDocumentsRequest, BatchGetDocumentsResponse, BatchGetResult,
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse, Document,
    ReadWriteOptions, RollbackRequest, RpcMethod, RunQueryRequest, RunQueryResponse,
    TransactionOptions,
};
pub use path::{DatabaseName, FieldPath, ResourcePath};
pub use query::{Direction, FieldFilter, FilterOp, Order, StructuredQuery};
pub use status::{RpcCode, RpcError, RpcResult};
pub use value::{
    field_value, leaf_field_paths, remove_field_value, set_field_value, DocumentData, Timestamp,
    TransactionId,
};
pub use write::{DocumentMask, Precondition, Write, WriteKind, WriteResult};

/// Re-export of the JSON-like value type stored in document fields.
pub use serde_json::Value;
