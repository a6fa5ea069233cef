//! # In-memory transports
//!
//! Utilities for exercising the remote path without sockets.
//!
//! - [`LoopbackTransport`] serves requests from the published adapters of
//!   another [`AdapterDirectory`] (typically a second
//!   [`Communicator`](crate::runtime::Communicator) playing the server), going
//!   through the full marshal → dispatch → marshal → unmarshal cycle.
//! - [`UnresponsiveTransport`] accepts requests and never answers.
//! - [`MockTransport`] replays scripted replies, with a fluent expectation API.
//! - [`StaticLocator`] resolves adapter ids from a fixed table.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{JsonMarshaler, Locator, Marshaler, OutgoingRequest, Reply, Transport, TransportError};
use crate::adapter::{AdapterState, DispatchError, ObjectAdapter};
use crate::directory::AdapterDirectory;
use crate::invocation::ApplicationException;
use crate::proxy::Endpoint;
use crate::servant::Current;

// =============================================================================
// LOOPBACK
// =============================================================================

/// Delivers requests to adapters published in a (server-side) directory.
#[derive(Clone)]
pub struct LoopbackTransport {
    directory: Arc<AdapterDirectory>,
    marshaler: Arc<dyn Marshaler>,
    served: Arc<AtomicU64>,
}

impl LoopbackTransport {
    pub fn new(directory: Arc<AdapterDirectory>) -> Self {
        Self::with_marshaler(directory, Arc::new(JsonMarshaler))
    }

    pub fn with_marshaler(directory: Arc<AdapterDirectory>, marshaler: Arc<dyn Marshaler>) -> Self {
        Self {
            directory,
            marshaler,
            served: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Requests that reached a server-side adapter.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// The adapter accepting connections on `endpoint`. A published adapter
    /// that was never activated is not listening.
    fn listening(&self, endpoint: &Endpoint) -> Result<Arc<ObjectAdapter>, TransportError> {
        self.directory
            .lookup_by_endpoint(endpoint)
            .filter(|adapter| adapter.state() == AdapterState::Activated)
            .ok_or_else(|| TransportError::ConnectionRefused(endpoint.clone()))
    }

    async fn serve(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<Bytes, TransportError> {
        let adapter = self.listening(endpoint)?;
        let args = self
            .marshaler
            .unmarshal_args(&request.payload)
            .map_err(|e| TransportError::Other(format!("bad request: {e}")))?;

        self.served.fetch_add(1, Ordering::Relaxed);
        let current = Current {
            adapter: adapter.name().to_string(),
            identity: request.identity.clone(),
            operation: request.operation.clone(),
            mode: request.mode,
            collocated: false,
        };
        debug!(adapter = %adapter.name(), identity = %current.identity, operation = %current.operation, "Serving request");

        let reply = reply_for(adapter.dispatch(&current, args).await)?;
        self.marshaler
            .marshal_reply(&reply)
            .map_err(|e| TransportError::Other(format!("bad reply: {e}")))
    }
}

/// What a server sends back for a dispatch outcome. An adapter deactivated
/// between connection and dispatch drops the connection instead of replying.
fn reply_for(outcome: Result<Value, DispatchError>) -> Result<Reply, TransportError> {
    match outcome {
        Ok(result) => Ok(Reply::Ok { result }),
        Err(DispatchError::Application(exception)) => Ok(Reply::UserException { exception }),
        Err(DispatchError::ObjectNotExist { identity, operation }) => Ok(Reply::ObjectNotExist { identity, operation }),
        Err(e @ DispatchError::AdapterInactive { .. }) => Err(TransportError::ConnectionLost(e.to_string())),
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<Bytes, TransportError> {
        self.serve(request, endpoint).await
    }

    async fn send_oneway(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.listening(endpoint)?;
        let transport = self.clone();
        let request = request.clone();
        let endpoint = endpoint.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.serve(&request, &endpoint).await {
                warn!(error = %e, operation = %request.operation, "Oneway request failed");
            }
        });
        Ok(())
    }
}

// =============================================================================
// UNRESPONSIVE
// =============================================================================

/// Accepts every request and never replies.
#[derive(Debug, Default)]
pub struct UnresponsiveTransport {
    sent: AtomicU64,
    pending: Arc<AtomicUsize>,
}

/// Tracks one request held by [`UnresponsiveTransport`]; released on drop.
struct Pending(Arc<AtomicUsize>);

impl Pending {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl UnresponsiveTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Requests currently waiting for a reply that will never come.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for UnresponsiveTransport {
    async fn send(&self, _request: &OutgoingRequest, _endpoint: &Endpoint) -> Result<Bytes, TransportError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        let _pending = Pending::new(&self.pending);
        std::future::pending::<Result<Bytes, TransportError>>().await
    }

    async fn send_oneway(&self, _request: &OutgoingRequest, _endpoint: &Endpoint) -> Result<(), TransportError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// SCRIPTED
// =============================================================================

enum Expectation {
    Reply(Reply),
    Fail(TransportError),
}

/// A transport that answers from a queue of scripted outcomes.
///
/// # Example
/// ```ignore
/// let mock = MockTransport::new();
/// mock.expect_send().return_ok(json!(42));
/// mock.expect_send().return_err(TransportError::ConnectionLost("reset".into()));
///
/// // invoke through a dispatcher built on `mock`...
/// mock.verify(); // every expectation was consumed
/// ```
#[derive(Default)]
pub struct MockTransport {
    marshaler: JsonMarshaler,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    requests: Mutex<Vec<(OutgoingRequest, Endpoint)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_send(&self) -> SendExpectationBuilder {
        SendExpectationBuilder {
            expectations: Arc::clone(&self.expectations),
        }
    }

    /// Every request seen so far, with the endpoint it was sent to.
    pub fn requests(&self) -> Vec<(OutgoingRequest, Endpoint)> {
        self.requests.lock().clone()
    }

    /// Panics when scripted outcomes were left unused.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().len();
        if remaining != 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<Bytes, TransportError> {
        self.requests.lock().push((request.clone(), endpoint.clone()));
        let expectation = self.expectations.lock().pop_front();
        match expectation {
            Some(Expectation::Reply(reply)) => self
                .marshaler
                .marshal_reply(&reply)
                .map_err(|e| TransportError::Other(e.to_string())),
            Some(Expectation::Fail(e)) => Err(e),
            None => panic!("Unexpected send of `{}` to {}", request.operation, endpoint),
        }
    }

    async fn send_oneway(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<(), TransportError> {
        self.send(request, endpoint).await.map(|_| ())
    }
}

/// Builder for one scripted `send` outcome.
pub struct SendExpectationBuilder {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl SendExpectationBuilder {
    pub fn return_ok(self, result: Value) {
        self.push(Expectation::Reply(Reply::Ok { result }));
    }

    pub fn return_exception(self, exception: ApplicationException) {
        self.push(Expectation::Reply(Reply::UserException { exception }));
    }

    pub fn return_reply(self, reply: Reply) {
        self.push(Expectation::Reply(reply));
    }

    pub fn return_err(self, error: TransportError) {
        self.push(Expectation::Fail(error));
    }

    fn push(self, expectation: Expectation) {
        self.expectations.lock().push_back(expectation);
    }
}

// =============================================================================
// LOCATOR
// =============================================================================

/// Adapter id → endpoints, from a fixed table.
#[derive(Debug, Default, Clone)]
pub struct StaticLocator {
    adapters: HashMap<String, Vec<Endpoint>>,
}

impl StaticLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, adapter_id: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        self.adapters.insert(adapter_id.into(), endpoints);
        self
    }
}

#[async_trait]
impl Locator for StaticLocator {
    async fn find_adapter_endpoints(&self, adapter_id: &str) -> Option<Vec<Endpoint>> {
        self.adapters.get(adapter_id).cloned()
    }
}
