//! Invocation outcomes seen by callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::adapter::DispatchError;
use crate::identity::Identity;
use crate::transport::{MarshalError, TransportError};

/// A failure reported by a servant itself. It crosses the remote path
/// unchanged, so both paths surface the same value.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{type_id}: {message}")]
pub struct ApplicationException {
    /// Application-defined exception type, e.g. `::Test::InvalidAmount`.
    pub type_id: String,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
}

impl ApplicationException {
    pub fn new(type_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            message: message.into(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Every way an invocation can fail. None of these is retried by the
/// dispatcher.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationError {
    /// No collocated servant and nowhere to send the request.
    #[error("no such object: {identity}")]
    NoSuchObject { identity: Identity },

    /// The target (local adapter or remote peer) does not know the identity.
    #[error("object `{identity}` does not exist (operation `{operation}`)")]
    ObjectNotExist { identity: Identity, operation: String },

    /// The resolved adapter stopped dispatching before the call started.
    #[error("object adapter `{adapter}` is deactivated")]
    AdapterDeactivated { adapter: String },

    /// The remote reply did not arrive within the proxy's timeout.
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("marshaling failure: {0}")]
    Marshal(#[from] MarshalError),

    #[error("application exception: {0}")]
    Application(#[from] ApplicationException),
}

impl From<DispatchError> for InvocationError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::ObjectNotExist { identity, operation } => InvocationError::ObjectNotExist { identity, operation },
            DispatchError::AdapterInactive { adapter, .. } => InvocationError::AdapterDeactivated { adapter },
            DispatchError::Application(e) => InvocationError::Application(e),
        }
    }
}
