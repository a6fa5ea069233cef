//! # Invocation Dispatcher
//!
//! Every call made through a [`Proxy`] ends up in [`Dispatcher::invoke`], which
//! picks one of two paths:
//!
//! - **Collocated**: the [`CollocationResolver`] found an eligible in-process
//!   adapter holding the servant. The servant runs inside the caller's task with
//!   the arguments as given: no marshaling, no transport, no timeout.
//! - **Remote**: arguments are marshaled, sent through the [`Transport`] to
//!   the proxy's endpoints (or the endpoints a [`Locator`] returns for its
//!   adapter id) and the reply is unmarshaled.
//!
//! Both paths report the same outcomes: a servant returning `V` yields
//! `Ok(Some(V))`, a servant raising `E` yields
//! [`InvocationError::Application`]`(E)`, an unknown identity at the target
//! yields [`InvocationError::ObjectNotExist`].
//!
//! ## Oneway calls
//! A oneway call returns `Ok(None)` as soon as the request is issued. On the
//! collocated path the servant runs on a spawned task, still counted as in
//! flight by its adapter; its failures are logged, never returned.

pub mod error;
pub mod metrics;

pub use error::*;
pub use metrics::*;

use bytes::Bytes;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::adapter::invoke_servant;
use crate::directory::AdapterDirectory;
use crate::proxy::{Endpoint, Mode, Proxy, Target};
use crate::resolver::{CollocatedTarget, CollocationResolver, Resolution};
use crate::servant::Current;
use crate::transport::{JsonMarshaler, Locator, Marshaler, NullTransport, OutgoingRequest, Reply, Transport, TransportError};

pub struct Dispatcher {
    resolver: CollocationResolver,
    transport: Arc<dyn Transport>,
    marshaler: Arc<dyn Marshaler>,
    locator: Option<Arc<dyn Locator>>,
    metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("resolver", &self.resolver)
            .field("has_locator", &self.locator.is_some())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with no network: remote calls fail with a transport failure.
    pub fn new(directory: Arc<AdapterDirectory>) -> Self {
        Self {
            resolver: CollocationResolver::new(directory),
            transport: Arc::new(NullTransport),
            marshaler: Arc::new(JsonMarshaler),
            locator: None,
            metrics: Arc::new(DispatchMetrics::default()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_marshaler(mut self, marshaler: Arc<dyn Marshaler>) -> Self {
        self.marshaler = marshaler;
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn Locator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn resolver(&self) -> &CollocationResolver {
        &self.resolver
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Invokes `operation` on the object behind `proxy`.
    ///
    /// Returns `Ok(None)` for oneway proxies and `Ok(Some(result))` otherwise.
    #[instrument(skip(self, proxy, args), fields(identity = %proxy.identity()))]
    pub async fn invoke(&self, proxy: &Proxy, operation: &str, args: Value) -> Result<Option<Value>, InvocationError> {
        match self.resolver.resolve(proxy) {
            Resolution::Collocated(target) => self.invoke_collocated(proxy, operation, args, target).await,
            Resolution::NoMatch => self.invoke_remote(proxy, operation, args).await,
        }
    }

    async fn invoke_collocated(
        &self,
        proxy: &Proxy,
        operation: &str,
        args: Value,
        target: CollocatedTarget,
    ) -> Result<Option<Value>, InvocationError> {
        // the adapter may have been deactivated since resolution
        let guard = target.adapter.begin_dispatch()?;
        self.metrics.record_collocated();

        let current = Current {
            adapter: target.adapter.name().to_string(),
            identity: proxy.identity().clone(),
            operation: operation.to_string(),
            mode: proxy.config().mode,
            collocated: true,
        };
        debug!(adapter = %current.adapter, operation, mode = ?current.mode, "Collocated dispatch");

        if proxy.config().is_oneway() {
            let servant = target.servant;
            tokio::spawn(async move {
                let _guard = guard;
                if let Err(e) = invoke_servant(servant.as_ref(), &current, args).await {
                    warn!(adapter = %current.adapter, operation = %current.operation, error = %e, "Oneway dispatch failed");
                }
            });
            return Ok(None);
        }

        let result = invoke_servant(target.servant.as_ref(), &current, args).await;
        drop(guard);
        Ok(Some(result?))
    }

    async fn invoke_remote(&self, proxy: &Proxy, operation: &str, args: Value) -> Result<Option<Value>, InvocationError> {
        // one budget for the locator lookup and every endpoint attempt
        let deadline = proxy.config().timeout.map(|timeout| (Instant::now() + timeout, timeout));

        let endpoints = self.before_deadline(deadline, operation, self.remote_endpoints(proxy)).await?;
        if endpoints.is_empty() {
            debug!(operation, "No collocated servant and no endpoints");
            return Err(InvocationError::NoSuchObject {
                identity: proxy.identity().clone(),
            });
        }

        self.metrics.record_remote();
        let payload = self.marshaler.marshal_args(&args)?;
        self.metrics.record_marshal();
        let request = OutgoingRequest {
            identity: proxy.identity().clone(),
            operation: operation.to_string(),
            mode: proxy.config().mode,
            payload,
        };

        let mut last_error = None;
        for endpoint in &endpoints {
            let outcome = self
                .before_deadline(deadline, operation, self.send_once(&request, endpoint))
                .await?;
            match outcome {
                Ok(reply) => return self.complete(reply),
                Err(e) => {
                    self.metrics.record_transport_failure();
                    debug!(operation, %endpoint, error = %e, "Endpoint failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map_or_else(
            || InvocationError::NoSuchObject {
                identity: proxy.identity().clone(),
            },
            InvocationError::from,
        ))
    }

    /// Runs `future` under the invocation deadline, if there is one. On expiry
    /// the future is dropped, releasing whatever it held.
    async fn before_deadline<F: Future>(
        &self,
        deadline: Option<(Instant, Duration)>,
        operation: &str,
        future: F,
    ) -> Result<F::Output, InvocationError> {
        let Some((deadline, timeout)) = deadline else {
            return Ok(future.await);
        };
        match tokio::time::timeout_at(deadline, future).await {
            Ok(output) => Ok(output),
            Err(_) => {
                self.metrics.record_timeout();
                warn!(operation, ?timeout, "Invocation timed out");
                Err(InvocationError::Timeout(timeout))
            }
        }
    }

    async fn send_once(&self, request: &OutgoingRequest, endpoint: &Endpoint) -> Result<Option<Bytes>, TransportError> {
        match request.mode {
            Mode::Twoway => self.transport.send(request, endpoint).await.map(Some),
            Mode::Oneway => self.transport.send_oneway(request, endpoint).await.map(|()| None),
        }
    }

    fn complete(&self, reply: Option<Bytes>) -> Result<Option<Value>, InvocationError> {
        let Some(bytes) = reply else {
            return Ok(None);
        };
        let reply = self.marshaler.unmarshal_reply(&bytes)?;
        self.metrics.record_marshal();
        match reply {
            Reply::Ok { result } => Ok(Some(result)),
            Reply::UserException { exception } => Err(InvocationError::Application(exception)),
            Reply::ObjectNotExist { identity, operation } => Err(InvocationError::ObjectNotExist { identity, operation }),
        }
    }

    async fn remote_endpoints(&self, proxy: &Proxy) -> Vec<Endpoint> {
        match proxy.target() {
            Target::Endpoints(_) => proxy.usable_endpoints(),
            Target::AdapterId(adapter_id) => match &self.locator {
                Some(locator) => match locator.find_adapter_endpoints(adapter_id).await {
                    Some(endpoints) => proxy.filter_endpoints(&endpoints),
                    None => Vec::new(),
                },
                None => Vec::new(),
            },
        }
    }
}
