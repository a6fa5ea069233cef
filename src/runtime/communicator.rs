use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::{Properties, RuntimeError};
use crate::adapter::{CollocationPolicy, ObjectAdapter};
use crate::clients::ObjectClient;
use crate::directory::AdapterDirectory;
use crate::invocation::{Dispatcher, InvocationError};
use crate::proxy::{Endpoint, InvocationConfig, Proxy};
use crate::transport::{Locator, Marshaler, Transport};

/// The process context of the RPC core.
///
/// `Communicator` is responsible for:
/// - **Adapter Management**: creating object adapters from configuration and
///   tracking them by name
/// - **Collocation**: owning the [`AdapterDirectory`] every adapter publishes
///   into and the [`Dispatcher`] every proxy call goes through
/// - **Shutdown**: deactivating and destroying every adapter it created
///
/// # Example
///
/// ```ignore
/// let communicator = Communicator::builder()
///     .properties(Properties::new().with("TestAdapter.Endpoints", "tcp -p 10000"))
///     .build()?;
///
/// let adapter = communicator.create_object_adapter("TestAdapter")?;
/// adapter.add(Identity::named("test"), Arc::new(MyServant))?;
/// adapter.activate()?;
///
/// let proxy = communicator.string_to_proxy("test:tcp -p 10000")?;
/// let result = communicator.invoke(&proxy, "op", json!([])).await?;
///
/// communicator.destroy().await;
/// ```
pub struct Communicator {
    properties: Properties,
    policy: CollocationPolicy,
    defaults: InvocationConfig,
    directory: Arc<AdapterDirectory>,
    dispatcher: Arc<Dispatcher>,
    adapters: Mutex<HashMap<String, Arc<ObjectAdapter>>>,
    unnamed: AtomicU64,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("policy", &self.policy)
            .field("adapters", &self.adapters.lock().keys().collect::<Vec<_>>())
            .field("destroyed", &self.destroyed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Collects the pluggable pieces before a [`Communicator`] is built.
#[derive(Default)]
pub struct CommunicatorBuilder {
    properties: Properties,
    transport: Option<Arc<dyn Transport>>,
    marshaler: Option<Arc<dyn Marshaler>>,
    locator: Option<Arc<dyn Locator>>,
}

impl CommunicatorBuilder {
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn marshaler(mut self, marshaler: Arc<dyn Marshaler>) -> Self {
        self.marshaler = Some(marshaler);
        self
    }

    pub fn locator(mut self, locator: Arc<dyn Locator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Validates the properties and assembles the communicator.
    pub fn build(self) -> Result<Communicator, RuntimeError> {
        let policy = self.properties.collocation_policy()?;
        let defaults = self.properties.invocation_defaults()?;

        let directory = Arc::new(AdapterDirectory::new());
        let mut dispatcher = Dispatcher::new(Arc::clone(&directory));
        if let Some(transport) = self.transport {
            dispatcher = dispatcher.with_transport(transport);
        }
        if let Some(marshaler) = self.marshaler {
            dispatcher = dispatcher.with_marshaler(marshaler);
        }
        if let Some(locator) = self.locator {
            dispatcher = dispatcher.with_locator(locator);
        }

        info!(?policy, "Communicator initialized");
        Ok(Communicator {
            properties: self.properties,
            policy,
            defaults,
            directory,
            dispatcher: Arc::new(dispatcher),
            adapters: Mutex::new(HashMap::new()),
            unnamed: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
        })
    }
}

impl Communicator {
    pub fn builder() -> CommunicatorBuilder {
        CommunicatorBuilder::default()
    }

    /// Communicator with default properties and no network transport.
    pub fn new() -> Result<Self, RuntimeError> {
        Self::builder().build()
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn collocation_policy(&self) -> CollocationPolicy {
        self.policy
    }

    pub fn invocation_defaults(&self) -> &InvocationConfig {
        &self.defaults
    }

    pub fn directory(&self) -> &Arc<AdapterDirectory> {
        &self.directory
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    // --- Adapters ---

    /// Creates an adapter configured by `<name>.Endpoints` and
    /// `<name>.AdapterId`. An empty name gets a generated one and no
    /// configuration.
    pub fn create_object_adapter(&self, name: &str) -> Result<Arc<ObjectAdapter>, RuntimeError> {
        if name.is_empty() {
            return self.create_adapter(String::new(), String::new(), Vec::new());
        }
        let endpoints = match self.properties.get_property(&format!("{name}.Endpoints")) {
            Some(list) => Endpoint::parse_list(list)?,
            None => Vec::new(),
        };
        let adapter_id = self
            .properties
            .get_property_with_default(&format!("{name}.AdapterId"), "")
            .to_string();
        self.create_adapter(name.to_string(), adapter_id, endpoints)
    }

    /// Creates an adapter with explicit endpoints, ignoring `<name>.Endpoints`.
    pub fn create_object_adapter_with_endpoints(&self, name: &str, endpoints: &str) -> Result<Arc<ObjectAdapter>, RuntimeError> {
        let endpoints = Endpoint::parse_list(endpoints)?;
        let adapter_id = self
            .properties
            .get_property_with_default(&format!("{name}.AdapterId"), "")
            .to_string();
        self.create_adapter(name.to_string(), adapter_id, endpoints)
    }

    fn create_adapter(&self, name: String, adapter_id: String, endpoints: Vec<Endpoint>) -> Result<Arc<ObjectAdapter>, RuntimeError> {
        if self.is_destroyed() {
            return Err(RuntimeError::CommunicatorDestroyed);
        }
        let name = if name.is_empty() {
            format!("adapter-{}", self.unnamed.fetch_add(1, Ordering::Relaxed))
        } else {
            name
        };

        let mut adapters = self.adapters.lock();
        if adapters.contains_key(&name) {
            return Err(RuntimeError::AdapterNameInUse(name));
        }
        let adapter = ObjectAdapter::create(name.clone(), adapter_id, endpoints, self.policy, Arc::clone(&self.directory))?;
        adapters.insert(name, Arc::clone(&adapter));
        Ok(adapter)
    }

    pub fn find_object_adapter(&self, name: &str) -> Option<Arc<ObjectAdapter>> {
        self.adapters.lock().get(name).cloned()
    }

    /// Destroys one adapter and forgets its name.
    pub async fn destroy_object_adapter(&self, name: &str) -> bool {
        let adapter = self.adapters.lock().remove(name);
        match adapter {
            Some(adapter) => {
                adapter.destroy().await;
                true
            }
            None => false,
        }
    }

    // --- Proxies & invocations ---

    /// Parses a stringified proxy using this communicator's invocation defaults.
    pub fn string_to_proxy(&self, s: &str) -> Result<Proxy, RuntimeError> {
        Ok(Proxy::parse_with(s, self.defaults.clone())?)
    }

    pub async fn invoke(&self, proxy: &Proxy, operation: &str, args: Value) -> Result<Option<Value>, InvocationError> {
        self.dispatcher.invoke(proxy, operation, args).await
    }

    /// Client bound to `proxy` and this communicator's dispatcher.
    pub fn client(&self, proxy: Proxy) -> ObjectClient {
        ObjectClient::new(proxy, Arc::clone(&self.dispatcher))
    }

    // --- Shutdown ---

    /// Deactivates every adapter, waiting for in-flight dispatches to drain.
    pub async fn shutdown(&self) {
        info!("Shutting down communicator...");
        let adapters: Vec<_> = self.adapters.lock().values().cloned().collect();
        for adapter in adapters {
            adapter.deactivate().await;
        }
        debug!("All adapters deactivated");
    }

    /// Shuts down, destroys every adapter and clears the directory. Further
    /// adapter creation fails with [`RuntimeError::CommunicatorDestroyed`].
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown().await;
        let adapters: Vec<_> = self.adapters.lock().drain().map(|(_, adapter)| adapter).collect();
        for adapter in adapters {
            adapter.destroy().await;
        }
        self.directory.clear();
        info!("Communicator destroyed");
    }
}
