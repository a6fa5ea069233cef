//! Seams to the outside world used by the remote path.
//!
//! The dispatcher only ever talks to a [`Transport`], a [`Marshaler`] and,
//! for indirect proxies, a [`Locator`]. None of them is consulted for a
//! collocated call.
//!
//! See [`mock`] for in-memory implementations used by tests and demos.

pub mod marshal;
pub mod mock;

pub use marshal::*;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::identity::Identity;
use crate::proxy::{Endpoint, Mode};

/// Opaque failures of the transport layer, surfaced to callers unchanged.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectionRefused(Endpoint),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("{0}")]
    Other(String),
}

/// A marshaled request, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub identity: Identity,
    pub operation: String,
    pub mode: Mode,
    /// Arguments as produced by [`Marshaler::marshal_args`].
    pub payload: Bytes,
}

/// Delivers marshaled requests to a remote endpoint.
///
/// # Cancellation
/// The dispatcher drops the `send` future when the proxy's timeout expires, so
/// implementations must release per-request resources on drop.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a twoway request and waits for the marshaled reply.
    async fn send(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<Bytes, TransportError>;

    /// Hands a oneway request to the transport without waiting for a reply.
    /// The default sends it as a twoway request and discards the reply.
    async fn send_oneway(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.send(request, endpoint).await.map(|_| ())
    }
}

/// Resolves an adapter id to the endpoints of a remote adapter.
#[async_trait]
pub trait Locator: Send + Sync + 'static {
    async fn find_adapter_endpoints(&self, adapter_id: &str) -> Option<Vec<Endpoint>>;
}

/// Transport for processes without network access: every send is refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, _request: &OutgoingRequest, endpoint: &Endpoint) -> Result<Bytes, TransportError> {
        Err(TransportError::ConnectionRefused(endpoint.clone()))
    }
}
