//! Error types for object adapters.

use thiserror::Error;

use super::AdapterState;
use crate::identity::Identity;
use crate::invocation::ApplicationException;
use crate::proxy::Endpoint;
use crate::servant::RegistryError;

/// Lifecycle and publication misuse. Reported immediately, never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AdapterError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The adapter already reached its terminal state.
    #[error("object adapter `{0}` has been deactivated")]
    AdapterDestroyed(String),

    /// Another live adapter already publishes this adapter id.
    #[error("adapter id `{0}` is already published")]
    AdapterIdInUse(String),

    /// Another live adapter already publishes this endpoint.
    #[error("endpoint `{0}` is already published")]
    EndpointInUse(Endpoint),
}

/// Failure of a single dispatch into an adapter, shared by the collocated path
/// and incoming remote requests.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// No servant (and no default servant) for the identity.
    #[error("object `{identity}` does not exist (operation `{operation}`)")]
    ObjectNotExist { identity: Identity, operation: String },

    /// The adapter is not in a state that allows dispatch.
    #[error("object adapter `{adapter}` cannot dispatch while {state:?}")]
    AdapterInactive { adapter: String, state: AdapterState },

    #[error(transparent)]
    Application(#[from] ApplicationException),
}
