//! Argument and reply encoding for the remote path.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::identity::Identity;
use crate::invocation::ApplicationException;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum MarshalError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Outcome of a remote dispatch as carried back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ok { result: Value },
    UserException { exception: ApplicationException },
    ObjectNotExist { identity: Identity, operation: String },
}

/// Converts arguments and replies to and from bytes.
pub trait Marshaler: Send + Sync + 'static {
    fn marshal_args(&self, args: &Value) -> Result<Bytes, MarshalError>;
    fn unmarshal_args(&self, bytes: &[u8]) -> Result<Value, MarshalError>;
    fn marshal_reply(&self, reply: &Reply) -> Result<Bytes, MarshalError>;
    fn unmarshal_reply(&self, bytes: &[u8]) -> Result<Reply, MarshalError>;
}

/// `serde_json` encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshaler;

impl JsonMarshaler {
    fn encode<T: Serialize>(value: &T) -> Result<Bytes, MarshalError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| MarshalError::Encode(e.to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, MarshalError> {
        serde_json::from_slice(bytes).map_err(|e| MarshalError::Decode(e.to_string()))
    }
}

impl Marshaler for JsonMarshaler {
    fn marshal_args(&self, args: &Value) -> Result<Bytes, MarshalError> {
        Self::encode(args)
    }

    fn unmarshal_args(&self, bytes: &[u8]) -> Result<Value, MarshalError> {
        Self::decode(bytes)
    }

    fn marshal_reply(&self, reply: &Reply) -> Result<Bytes, MarshalError> {
        Self::encode(reply)
    }

    fn unmarshal_reply(&self, bytes: &[u8]) -> Result<Reply, MarshalError> {
        Self::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_exceptions_survive_encoding() {
        let marshaler = JsonMarshaler;
        let reply = Reply::UserException {
            exception: ApplicationException::new("::Test::Overdrawn", "balance too low").with_payload(json!({"short": 12})),
        };
        let bytes = marshaler.marshal_reply(&reply).unwrap();
        assert_eq!(marshaler.unmarshal_reply(&bytes).unwrap(), reply);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = JsonMarshaler.unmarshal_reply(b"\x00not json").unwrap_err();
        assert!(matches!(err, MarshalError::Decode(_)));
        let err = JsonMarshaler.unmarshal_reply(br#"{"status":"teleported"}"#).unwrap_err();
        assert!(matches!(err, MarshalError::Decode(_)));
    }
}
