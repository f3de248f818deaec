//! RPC status codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Canonical status code of a failed RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcCode {
    /// The call was cancelled.
    Cancelled,
    /// Unknown error.
    Unknown,
    /// The request was malformed or referenced an unknown/expired transaction.
    InvalidArgument,
    /// The deadline expired before the call completed.
    DeadlineExceeded,
    /// A document required by the request does not exist.
    NotFound,
    /// A document the request meant to create already exists.
    AlreadyExists,
    /// The caller lacks permission.
    PermissionDenied,
    /// Quota or rate limit exhausted.
    ResourceExhausted,
    /// A precondition on the write failed.
    FailedPrecondition,
    /// The transaction was aborted, typically due to contention.
    Aborted,
    /// The operation is not supported.
    Unimplemented,
    /// Internal server error.
    Internal,
    /// The service is temporarily unavailable.
    Unavailable,
    /// Missing or invalid credentials.
    Unauthenticated,
}

impl RpcCode {
    /// Returns the code name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcCode::Cancelled => "CANCELLED",
            RpcCode::Unknown => "UNKNOWN",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::AlreadyExists => "ALREADY_EXISTS",
            RpcCode::PermissionDenied => "PERMISSION_DENIED",
            RpcCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            RpcCode::FailedPrecondition => "FAILED_PRECONDITION",
            RpcCode::Aborted => "ABORTED",
            RpcCode::Unimplemented => "UNIMPLEMENTED",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
            RpcCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Returns true if an idempotent call failing with this code may be
    /// re-sent as-is by the transport.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RpcCode::Unavailable | RpcCode::DeadlineExceeded | RpcCode::ResourceExhausted
        )
    }

    /// Returns true if a commit failing with this code warrants running the
    /// whole transaction again.
    pub fn is_transaction_retryable(&self) -> bool {
        matches!(
            self,
            RpcCode::Aborted
                | RpcCode::Cancelled
                | RpcCode::Unknown
                | RpcCode::DeadlineExceeded
                | RpcCode::Internal
                | RpcCode::Unavailable
                | RpcCode::Unauthenticated
                | RpcCode::ResourceExhausted
        )
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed RPC: status code plus message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RpcError {
    /// Status code.
    pub code: RpcCode,
    /// Human-readable detail.
    pub message: String,
}

impl RpcError {
    /// Creates an RPC error.
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an `ABORTED` error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Aborted, message)
    }

    /// Creates an `UNAVAILABLE` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unavailable, message)
    }

    /// Creates an `INVALID_ARGUMENT` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcCode::InvalidArgument, message)
    }

    /// Creates an `INTERNAL` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }
}
