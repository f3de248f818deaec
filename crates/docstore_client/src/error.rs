//! Error types for the transaction client.

use crate::transaction::AttemptState;
use docstore_protocol::{PathError, RpcError};
use thiserror::Error;

/// Result type for transaction operations.
pub type TxnResult<T> = Result<T, TransactionError>;

/// Errors that can occur while running a transaction.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// A read was issued after a write was buffered on the same attempt.
    #[error("transactions require all reads to be executed before all writes")]
    ReadAfterWrite,

    /// The operation needs a transaction id and `begin` has not succeeded.
    #[error("{operation} requires a begun transaction")]
    NotBegun {
        /// Operation that was refused.
        operation: &'static str,
    },

    /// `begin` was called on an attempt that already has a transaction id.
    #[error("transaction already begun")]
    AlreadyBegun,

    /// The attempt has been committed or rolled back.
    #[error("transaction attempt is finished ({state:?})")]
    Finished {
        /// Terminal state of the attempt.
        state: AttemptState,
    },

    /// Malformed input; detected locally before any network call.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// Obtaining a transaction id failed.
    #[error("begin transaction failed: {0}")]
    Begin(#[source] RpcError),

    /// A document or query read failed.
    #[error("read failed: {0}")]
    Read(#[source] RpcError),

    /// Commit failed, possibly due to contention.
    #[error("commit failed: {0}")]
    Commit(#[source] RpcError),

    /// Rollback failed.
    #[error("rollback failed: {0}")]
    Rollback(#[source] RpcError),

    /// The user-supplied transaction function failed.
    #[error("transaction function failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransactionError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Wraps a failure raised by user code inside a transaction function.
    pub fn callback(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Callback(err.into())
    }

    /// Returns true if this is a caller sequencing bug (read after write,
    /// use before begin, reuse of a finished attempt).
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            TransactionError::ReadAfterWrite
                | TransactionError::NotBegun { .. }
                | TransactionError::AlreadyBegun
                | TransactionError::Finished { .. }
        )
    }

    /// Returns true if the whole transaction may be run again.
    ///
    /// Only commit failures qualify, and only for contention or transient
    /// status codes.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransactionError::Commit(status) => status.code.is_transaction_retryable(),
            _ => false,
        }
    }

    /// Returns the RPC status behind a network failure.
    pub fn status(&self) -> Option<&RpcError> {
        match self {
            TransactionError::Begin(s)
            | TransactionError::Read(s)
            | TransactionError::Commit(s)
            | TransactionError::Rollback(s) => Some(s),
            _ => None,
        }
    }
}

impl From<PathError> for TransactionError {
    fn from(err: PathError) -> Self {
        Self::invalid_argument(err.to_string())
    }
}
