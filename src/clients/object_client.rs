use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::adapter::PING_OPERATION;
use crate::invocation::{ApplicationException, Dispatcher, InvocationError};
use crate::proxy::Proxy;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error("conversion failed: {0}")]
    Conversion(String),
}

impl ClientError {
    /// The user exception raised by the servant, if that is what failed.
    pub fn application(&self) -> Option<&ApplicationException> {
        match self {
            ClientError::Invocation(InvocationError::Application(e)) => Some(e),
            _ => None,
        }
    }
}

/// A proxy bound to the dispatcher that executes its calls.
#[derive(Clone)]
pub struct ObjectClient {
    proxy: Proxy,
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for ObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectClient").field("proxy", &self.proxy).finish()
    }
}

impl ObjectClient {
    pub fn new(proxy: Proxy, dispatcher: Arc<Dispatcher>) -> Self {
        Self { proxy, dispatcher }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Same dispatcher, different proxy.
    pub fn with_proxy(&self, proxy: Proxy) -> Self {
        Self {
            proxy,
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }

    pub async fn invoke(&self, operation: &str, args: Value) -> Result<Option<Value>, InvocationError> {
        self.dispatcher.invoke(&self.proxy, operation, args).await
    }

    /// Checks that the target object exists and is reachable.
    #[instrument(skip(self), fields(identity = %self.proxy.identity()))]
    pub async fn ping(&self) -> Result<(), InvocationError> {
        debug!("Sending ping");
        self.invoke(PING_OPERATION, Value::Null).await.map(|_| ())
    }

    /// Twoway call with serde conversion on both sides. A oneway proxy yields
    /// `R` from JSON `null`.
    #[instrument(skip(self, args), fields(identity = %self.proxy.identity()))]
    pub async fn call<A, R>(&self, operation: &str, args: &A) -> Result<R, ClientError>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        debug!("Sending request");
        let args = serde_json::to_value(args).map_err(|e| ClientError::Conversion(e.to_string()))?;
        let result = self.invoke(operation, args).await?.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| ClientError::Conversion(e.to_string()))
    }
}
