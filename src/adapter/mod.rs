//! # Object Adapters
//!
//! An [`ObjectAdapter`] binds a set of servants to a published location (an
//! adapter id and/or a list of endpoints) and gates their reachability through
//! a lifecycle:
//!
//! ```text
//! Created ──activate()──▶ Activated ──deactivate()──▶ Deactivated (terminal)
//!    └──────────────────deactivate()───────────────────────▲
//! ```
//!
//! Servants can be added and removed in every state; registration is
//! independent of publication. Requests arriving from a transport are served
//! only while `Activated`. Which states accept collocated dispatch is decided
//! by the [`CollocationPolicy`] the adapter was created with.
//!
//! ## Deactivation
//! `deactivate()` flips the state first, so every dispatch that starts
//! afterwards fails with [`DispatchError::AdapterInactive`], then unpublishes
//! the adapter and finally waits until dispatches already in flight have
//! drained. Those in-flight calls finish normally with the servant they
//! already hold.

pub mod error;

pub use error::*;

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::directory::AdapterDirectory;
use crate::identity::Identity;
use crate::invocation::ApplicationException;
use crate::proxy::{Endpoint, Proxy};
use crate::servant::{Current, RegistryError, Servant, ServantRegistry};

/// Built-in operation answered for any registered identity without reaching
/// the servant.
pub const PING_OPERATION: &str = "ice_ping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterState {
    Created,
    Activated,
    Deactivated,
}

/// Which adapter states are visible to collocation and accept collocated
/// dispatch. Remote dispatch always requires `Activated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollocationPolicy {
    /// Only `Activated` adapters are published and dispatch.
    #[default]
    RequireActivation,
    /// Adapters are published at creation; `Created` and `Activated` both
    /// dispatch collocated calls. Activation is then only needed for the
    /// outside world.
    OnCreation,
}

impl CollocationPolicy {
    pub fn accepts(self, state: AdapterState) -> bool {
        match state {
            AdapterState::Activated => true,
            AdapterState::Created => self == CollocationPolicy::OnCreation,
            AdapterState::Deactivated => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lifecycle {
    state: AdapterState,
    in_flight: usize,
}

pub struct ObjectAdapter {
    name: String,
    adapter_id: String,
    endpoints: Vec<Endpoint>,
    policy: CollocationPolicy,
    registry: ServantRegistry,
    lifecycle: watch::Sender<Lifecycle>,
    directory: Arc<AdapterDirectory>,
}

impl fmt::Debug for ObjectAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectAdapter")
            .field("name", &self.name)
            .field("adapter_id", &self.adapter_id)
            .field("endpoints", &self.endpoints)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}

impl ObjectAdapter {
    /// Creates an adapter in the `Created` state. Under
    /// [`CollocationPolicy::OnCreation`] it is published right away.
    pub fn create(
        name: impl Into<String>,
        adapter_id: impl Into<String>,
        endpoints: Vec<Endpoint>,
        policy: CollocationPolicy,
        directory: Arc<AdapterDirectory>,
    ) -> Result<Arc<Self>, AdapterError> {
        let (lifecycle, _) = watch::channel(Lifecycle {
            state: AdapterState::Created,
            in_flight: 0,
        });
        let adapter = Arc::new(Self {
            name: name.into(),
            adapter_id: adapter_id.into(),
            endpoints,
            policy,
            registry: ServantRegistry::new(),
            lifecycle,
            directory,
        });

        if policy == CollocationPolicy::OnCreation {
            adapter.directory.register(&adapter)?;
        }
        debug!(adapter = %adapter.name, adapter_id = %adapter.adapter_id, ?policy, "Adapter created");
        Ok(adapter)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn policy(&self) -> CollocationPolicy {
        self.policy
    }

    pub fn state(&self) -> AdapterState {
        self.lifecycle.borrow().state
    }

    pub fn in_flight(&self) -> usize {
        self.lifecycle.borrow().in_flight
    }

    pub fn is_deactivated(&self) -> bool {
        self.state() == AdapterState::Deactivated
    }

    /// Whether the current state accepts dispatch under this adapter's policy.
    pub fn accepts_dispatch(&self) -> bool {
        self.policy.accepts(self.state())
    }

    // --- Lifecycle ---

    /// `Created` → `Activated`, publishing the adapter id and endpoints.
    /// A no-op when already active.
    pub fn activate(self: &Arc<Self>) -> Result<(), AdapterError> {
        let mut outcome = Ok(false);
        self.lifecycle.send_if_modified(|lifecycle| match lifecycle.state {
            AdapterState::Activated => false,
            AdapterState::Deactivated => {
                outcome = Err(AdapterError::AdapterDestroyed(self.name.clone()));
                false
            }
            AdapterState::Created => match self.directory.register(self) {
                Ok(()) => {
                    lifecycle.state = AdapterState::Activated;
                    outcome = Ok(true);
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            },
        });

        match outcome {
            Ok(true) => {
                info!(adapter = %self.name, adapter_id = %self.adapter_id, endpoints = self.endpoints.len(), "Adapter activated");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(adapter = %self.name, error = %e, "Activation failed");
                Err(e)
            }
        }
    }

    /// Moves to `Deactivated`, unpublishes, and waits for in-flight
    /// dispatches to drain. Idempotent.
    pub async fn deactivate(&self) {
        let mut previous = AdapterState::Deactivated;
        self.lifecycle.send_if_modified(|lifecycle| {
            previous = lifecycle.state;
            lifecycle.state = AdapterState::Deactivated;
            previous != AdapterState::Deactivated
        });

        if previous != AdapterState::Deactivated {
            self.directory.unregister(self);
            info!(adapter = %self.name, in_flight = self.in_flight(), "Adapter deactivating");
        }
        self.wait_for_deactivate().await;
    }

    /// Resolves once the adapter is deactivated and no dispatch is in flight.
    pub async fn wait_for_deactivate(&self) {
        let mut receiver = self.lifecycle.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = receiver
            .wait_for(|lifecycle| lifecycle.state == AdapterState::Deactivated && lifecycle.in_flight == 0)
            .await;
        debug!(adapter = %self.name, "Adapter drained");
    }

    /// Deactivates and drops every servant.
    pub async fn destroy(&self) {
        self.deactivate().await;
        self.registry.clear();
        info!(adapter = %self.name, "Adapter destroyed");
    }

    // --- Servants (legal in every state) ---

    pub fn add(&self, identity: Identity, servant: Arc<dyn Servant>) -> Result<(), AdapterError> {
        Ok(self.registry.add(identity, servant)?)
    }

    pub fn remove(&self, identity: &Identity) -> Result<Arc<dyn Servant>, AdapterError> {
        Ok(self.registry.remove(identity)?)
    }

    pub fn find(&self, identity: &Identity) -> Option<Arc<dyn Servant>> {
        self.registry.find(identity)
    }

    pub fn add_default_servant(&self, category: impl Into<String>, servant: Arc<dyn Servant>) -> Result<(), AdapterError> {
        Ok(self.registry.add_default_servant(category, servant)?)
    }

    pub fn remove_default_servant(&self, category: &str) -> Result<Arc<dyn Servant>, RegistryError> {
        self.registry.remove_default_servant(category)
    }

    pub fn registry(&self) -> &ServantRegistry {
        &self.registry
    }

    // --- Proxies ---

    /// Proxy for `identity` that targets this adapter by id when it has one,
    /// by endpoints otherwise.
    pub fn create_proxy(&self, identity: Identity) -> Proxy {
        if self.adapter_id.is_empty() {
            self.create_direct_proxy(identity)
        } else {
            Proxy::indirect(identity, self.adapter_id.clone())
        }
    }

    pub fn create_direct_proxy(&self, identity: Identity) -> Proxy {
        Proxy::direct(identity, self.endpoints.clone())
    }

    // --- Dispatch ---

    /// Marks the start of a collocated dispatch. Fails once the state no longer
    /// accepts dispatch under the adapter's policy; the returned guard keeps
    /// `deactivate()` waiting until dropped.
    pub fn begin_dispatch(self: &Arc<Self>) -> Result<DispatchGuard, DispatchError> {
        let policy = self.policy;
        self.begin(|state| policy.accepts(state))
    }

    /// Marks the start of a dispatch for a request that arrived from a
    /// transport. Only an `Activated` adapter serves the network, whatever the
    /// collocation policy.
    pub fn begin_incoming_dispatch(self: &Arc<Self>) -> Result<DispatchGuard, DispatchError> {
        self.begin(|state| state == AdapterState::Activated)
    }

    fn begin(self: &Arc<Self>, accepts: impl Fn(AdapterState) -> bool) -> Result<DispatchGuard, DispatchError> {
        let mut refused = None;
        self.lifecycle.send_if_modified(|lifecycle| {
            if accepts(lifecycle.state) {
                lifecycle.in_flight += 1;
                true
            } else {
                refused = Some(lifecycle.state);
                false
            }
        });

        match refused {
            Some(state) => Err(DispatchError::AdapterInactive {
                adapter: self.name.clone(),
                state,
            }),
            None => Ok(DispatchGuard {
                adapter: Arc::clone(self),
            }),
        }
    }

    /// Dispatches a request addressed to this adapter: looks up the servant for
    /// `current.identity` and runs it under a dispatch guard. Requests with
    /// `current.collocated == false` came from a transport and need an
    /// `Activated` adapter.
    pub async fn dispatch(self: &Arc<Self>, current: &Current, args: Value) -> Result<Value, DispatchError> {
        let _guard = if current.collocated {
            self.begin_dispatch()?
        } else {
            self.begin_incoming_dispatch()?
        };
        let servant = self.find(&current.identity).ok_or_else(|| DispatchError::ObjectNotExist {
            identity: current.identity.clone(),
            operation: current.operation.clone(),
        })?;
        Ok(invoke_servant(servant.as_ref(), current, args).await?)
    }
}

/// Runs one operation on a servant, answering built-in operations itself.
pub(crate) async fn invoke_servant(
    servant: &dyn Servant,
    current: &Current,
    args: Value,
) -> Result<Value, ApplicationException> {
    if current.operation == PING_OPERATION {
        return Ok(Value::Null);
    }
    servant.dispatch(current, args).await
}

/// Counts one in-flight dispatch; dropping it may complete a pending
/// `deactivate()`.
pub struct DispatchGuard {
    adapter: Arc<ObjectAdapter>,
}

impl DispatchGuard {
    pub fn adapter(&self) -> &Arc<ObjectAdapter> {
        &self.adapter
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.adapter.lifecycle.send_modify(|lifecycle| lifecycle.in_flight -= 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::Mode;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Echo;

    #[async_trait]
    impl Servant for Echo {
        async fn dispatch(&self, _current: &Current, args: Value) -> Result<Value, ApplicationException> {
            Ok(args)
        }
    }

    /// Blocks every call until released.
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Servant for Gate {
        async fn dispatch(&self, _current: &Current, _args: Value) -> Result<Value, ApplicationException> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(json!("released"))
        }
    }

    fn adapter(policy: CollocationPolicy) -> Arc<ObjectAdapter> {
        let directory = Arc::new(AdapterDirectory::new());
        ObjectAdapter::create("TestAdapter", "TestAdapter", vec![Endpoint::tcp("localhost", 10000)], policy, directory)
            .unwrap()
    }

    fn current(operation: &str) -> Current {
        Current {
            adapter: "TestAdapter".into(),
            identity: Identity::named("test"),
            operation: operation.into(),
            mode: Mode::Twoway,
            collocated: true,
        }
    }

    #[test]
    fn policy_decides_eligible_states() {
        assert!(!CollocationPolicy::RequireActivation.accepts(AdapterState::Created));
        assert!(CollocationPolicy::RequireActivation.accepts(AdapterState::Activated));
        assert!(CollocationPolicy::OnCreation.accepts(AdapterState::Created));
        assert!(!CollocationPolicy::OnCreation.accepts(AdapterState::Deactivated));
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let adapter = adapter(CollocationPolicy::RequireActivation);
        assert_eq!(adapter.state(), AdapterState::Created);
        assert!(adapter.directory.lookup_by_adapter_id("TestAdapter").is_none());

        adapter.activate().unwrap();
        adapter.activate().unwrap();
        assert_eq!(adapter.state(), AdapterState::Activated);
        assert!(adapter.directory.lookup_by_adapter_id("TestAdapter").is_some());

        adapter.deactivate().await;
        adapter.deactivate().await;
        assert!(adapter.is_deactivated());
        assert!(adapter.directory.lookup_by_adapter_id("TestAdapter").is_none());

        let err = adapter.activate().unwrap_err();
        assert_eq!(err, AdapterError::AdapterDestroyed("TestAdapter".into()));
    }

    #[tokio::test]
    async fn on_creation_policy_publishes_immediately() {
        let adapter = adapter(CollocationPolicy::OnCreation);
        assert_eq!(adapter.state(), AdapterState::Created);
        assert!(adapter.directory.lookup_by_endpoint(&Endpoint::tcp("localhost", 10000)).is_some());
        assert!(adapter.accepts_dispatch());

        adapter.deactivate().await;
        assert!(adapter.directory.lookup_by_adapter_id("TestAdapter").is_none());
    }

    #[tokio::test]
    async fn servants_can_change_in_any_state() {
        let adapter = adapter(CollocationPolicy::RequireActivation);
        adapter.add(Identity::named("a"), Arc::new(Echo)).unwrap();
        adapter.activate().unwrap();
        adapter.add(Identity::named("b"), Arc::new(Echo)).unwrap();
        adapter.deactivate().await;
        adapter.remove(&Identity::named("a")).unwrap();
        adapter.add(Identity::named("c"), Arc::new(Echo)).unwrap();
        assert_eq!(adapter.registry().len(), 2);

        let err = adapter.add(Identity::named("b"), Arc::new(Echo)).unwrap_err();
        assert!(matches!(err, AdapterError::Registry(RegistryError::IdentityAlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn dispatch_requires_eligible_state() {
        let adapter = adapter(CollocationPolicy::RequireActivation);
        adapter.add(Identity::named("test"), Arc::new(Echo)).unwrap();

        let err = adapter.dispatch(&current("echo"), json!(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::AdapterInactive { state: AdapterState::Created, .. }));

        adapter.activate().unwrap();
        assert_eq!(adapter.dispatch(&current("echo"), json!(1)).await, Ok(json!(1)));
        assert_eq!(adapter.dispatch(&current(PING_OPERATION), json!(1)).await, Ok(Value::Null));

        adapter.deactivate().await;
        let err = adapter.dispatch(&current("echo"), json!(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::AdapterInactive { state: AdapterState::Deactivated, .. }));
        assert_eq!(adapter.in_flight(), 0);
    }

    #[tokio::test]
    async fn incoming_requests_need_activation_under_every_policy() {
        let adapter = adapter(CollocationPolicy::OnCreation);
        adapter.add(Identity::named("test"), Arc::new(Echo)).unwrap();
        let incoming = Current {
            collocated: false,
            ..current("echo")
        };

        assert_eq!(adapter.dispatch(&current("echo"), json!(1)).await, Ok(json!(1)));
        let err = adapter.dispatch(&incoming, json!(1)).await.unwrap_err();
        assert!(matches!(err, DispatchError::AdapterInactive { state: AdapterState::Created, .. }));
        assert!(adapter.begin_incoming_dispatch().is_err());

        adapter.activate().unwrap();
        assert_eq!(adapter.dispatch(&incoming, json!(2)).await, Ok(json!(2)));
        assert_eq!(adapter.in_flight(), 0);
    }

    #[tokio::test]
    async fn unknown_identity_is_object_not_exist() {
        let adapter = adapter(CollocationPolicy::RequireActivation);
        adapter.activate().unwrap();
        let err = adapter.dispatch(&current("echo"), Value::Null).await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::ObjectNotExist {
                identity: Identity::named("test"),
                operation: "echo".into()
            }
        );
    }

    #[tokio::test]
    async fn deactivate_waits_for_in_flight_dispatch() {
        let adapter = adapter(CollocationPolicy::RequireActivation);
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        adapter.add(Identity::named("test"), gate.clone()).unwrap();
        adapter.activate().unwrap();

        let call = {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.dispatch(&current("wait"), Value::Null).await })
        };
        gate.entered.notified().await;
        assert_eq!(adapter.in_flight(), 1);

        let deactivation = {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.deactivate().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!deactivation.is_finished(), "deactivate must wait for the dispatch");
        assert!(adapter.is_deactivated());

        gate.release.notify_one();
        assert_eq!(call.await.unwrap(), Ok(json!("released")));
        tokio::time::timeout(Duration::from_secs(1), deactivation)
            .await
            .expect("deactivate should finish after drain")
            .unwrap();
        assert_eq!(adapter.in_flight(), 0);
    }
}
