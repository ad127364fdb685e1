// Codec Port
// Marshal/unmarshal functions moving messages in and out of an external list

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Message -> bytes
pub type MarshalFn<M> = Arc<dyn Fn(&M) -> Result<Vec<u8>, CodecError> + Send + Sync>;

/// bytes -> Message
pub type UnmarshalFn<M> = Arc<dyn Fn(&[u8]) -> Result<M, CodecError> + Send + Sync>;

/// serde_json marshal function for any serializable message
pub fn json_marshal<M>() -> MarshalFn<M>
where
    M: Serialize + 'static,
{
    Arc::new(|msg: &M| serde_json::to_vec(msg).map_err(|e| CodecError::Encode(e.to_string())))
}

/// serde_json unmarshal function for any deserializable message
pub fn json_unmarshal<M>() -> UnmarshalFn<M>
where
    M: DeserializeOwned + 'static,
{
    Arc::new(|bytes: &[u8]| {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    })
}
