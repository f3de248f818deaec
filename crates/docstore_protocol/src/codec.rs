//! CBOR encoding of wire messages.
//!
//! Messages are plain serde types. A reply travels as `Result<T, RpcError>`
//! so that a status survives the hop between server and client unchanged.

use crate::error::{CodecError, CodecResult};
use crate::status::RpcError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a message to CBOR bytes.
pub fn encode<T: Serialize>(message: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(message, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decodes a message from CBOR bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Encodes an RPC reply (a response or a status).
pub fn encode_reply<T: Serialize>(reply: &Result<T, RpcError>) -> CodecResult<Vec<u8>> {
    encode(reply)
}

/// Decodes an RPC reply (a response or a status).
pub fn decode_reply<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<Result<T, RpcError>> {
    decode(bytes)
}
