//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization to CBOR failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Deserialization from CBOR failed.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Errors produced when parsing resource or field paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path had no segments.
    #[error("path must not be empty")]
    Empty,

    /// A segment between separators was empty.
    #[error("path {path:?} contains an empty segment")]
    EmptySegment {
        /// The offending path.
        path: String,
    },

    /// The path does not point at the expected kind of resource.
    #[error("path {path:?} is not a {expected} path")]
    WrongKind {
        /// The offending path.
        path: String,
        /// "document" or "collection".
        expected: &'static str,
    },
}
