//! JSON encoding and decoding.
//!
//! The codec is handed to each [`Agent`](crate::Agent) instead of being a hidden
//! global, so tests and applications can swap in their own encoding rules.

use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};

/// Encodes and decodes generic JSON values.
pub trait JsonCodec: Send + Sync + std::fmt::Debug {
    /// Encode a value into its JSON byte representation.
    fn encode(&self, value: &Value) -> Result<Bytes>;

    /// Decode JSON bytes into a value.
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// The default codec, backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn encode(&self, value: &Value) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::Serialize(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialize(e.to_string()))
    }
}
