//! Error types for the emulator.

use docstore_protocol::{CodecError, ResourcePath, RpcCode, RpcError, TransactionId};
use thiserror::Error;

/// Result type for emulator operations.
pub type EmulatorResult<T> = Result<T, EmulatorError>;

/// Errors the emulator reports to clients.
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// Malformed or oversized request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request names a database this emulator does not serve.
    #[error("unknown database {actual}, serving {expected}")]
    WrongDatabase {
        /// Database served.
        expected: String,
        /// Database requested.
        actual: String,
    },

    /// The transaction id is not open.
    #[error("transaction {0} is not open")]
    UnknownTransaction(TransactionId),

    /// A document read by the transaction changed before commit.
    #[error("transaction {transaction} aborted: {path} changed since it was read")]
    Contention {
        /// The aborted transaction.
        transaction: TransactionId,
        /// First document found changed.
        path: ResourcePath,
    },

    /// The write requires an existing document.
    #[error("no document to update: {0}")]
    NotFound(ResourcePath),

    /// The write requires the document not to exist.
    #[error("document already exists: {0}")]
    AlreadyExists(ResourcePath),

    /// An update-time precondition did not hold.
    #[error("update time precondition failed for {0}")]
    PreconditionFailed(ResourcePath),

    /// A failure scheduled with `inject_commit_failure`.
    #[error("injected {0} failure")]
    Injected(RpcCode),

    /// The request body could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl EmulatorError {
    /// Returns the status code sent to the client.
    pub fn code(&self) -> RpcCode {
        match self {
            EmulatorError::InvalidRequest(_)
            | EmulatorError::WrongDatabase { .. }
            | EmulatorError::UnknownTransaction(_)
            | EmulatorError::Codec(_) => RpcCode::InvalidArgument,
            EmulatorError::Contention { .. } => RpcCode::Aborted,
            EmulatorError::NotFound(_) => RpcCode::NotFound,
            EmulatorError::AlreadyExists(_) => RpcCode::AlreadyExists,
            EmulatorError::PreconditionFailed(_) => RpcCode::FailedPrecondition,
            EmulatorError::Injected(code) => *code,
        }
    }

    /// Returns true if the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        self.code() == RpcCode::InvalidArgument
    }
}

impl From<EmulatorError> for RpcError {
    fn from(err: EmulatorError) -> Self {
        RpcError::new(err.code(), err.to_string())
    }
}
