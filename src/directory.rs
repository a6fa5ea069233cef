//! Process-wide index of published object adapters.
//!
//! The directory is an explicit value owned by a
//! [`Communicator`](crate::runtime::Communicator) and shared with its adapters
//! by `Arc`. Adapters publish themselves on activation (or creation, depending
//! on policy) and unpublish on deactivation. Both indices sit behind one lock,
//! so a lookup sees an adapter either fully published or not at all.
//!
//! Entries are weak references: the directory never keeps a dropped adapter
//! alive.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::adapter::{AdapterError, ObjectAdapter};
use crate::proxy::Endpoint;

#[derive(Default)]
struct Index {
    by_id: HashMap<String, Weak<ObjectAdapter>>,
    by_endpoint: HashMap<Endpoint, Weak<ObjectAdapter>>,
}

#[derive(Default)]
pub struct AdapterDirectory {
    index: RwLock<Index>,
}

impl std::fmt::Debug for AdapterDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.read();
        f.debug_struct("AdapterDirectory")
            .field("adapter_ids", &index.by_id.keys().collect::<Vec<_>>())
            .field("endpoints", &index.by_endpoint.len())
            .finish()
    }
}

/// `true` when `entry` is held by a live adapter other than `adapter`.
fn taken_by_other(entry: Option<&Weak<ObjectAdapter>>, adapter: &Arc<ObjectAdapter>) -> bool {
    entry
        .and_then(Weak::upgrade)
        .is_some_and(|holder| !Arc::ptr_eq(&holder, adapter))
}

fn held_by(entry: &Weak<ObjectAdapter>, adapter: &ObjectAdapter) -> bool {
    std::ptr::eq(entry.as_ptr(), adapter)
}

impl AdapterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the adapter's id (when non-empty) and every endpoint in one
    /// step. Nothing is published when any of them belongs to another live
    /// adapter. Re-registering the same adapter is a no-op.
    ///
    /// Must not inspect the adapter's lifecycle: it runs while the adapter's
    /// state is being changed.
    pub fn register(&self, adapter: &Arc<ObjectAdapter>) -> Result<(), AdapterError> {
        let mut index = self.index.write();

        let adapter_id = adapter.adapter_id();
        if !adapter_id.is_empty() && taken_by_other(index.by_id.get(adapter_id), adapter) {
            return Err(AdapterError::AdapterIdInUse(adapter_id.to_string()));
        }
        if let Some(endpoint) = adapter
            .endpoints()
            .iter()
            .find(|endpoint| taken_by_other(index.by_endpoint.get(*endpoint), adapter))
        {
            return Err(AdapterError::EndpointInUse(endpoint.clone()));
        }

        let weak = Arc::downgrade(adapter);
        if !adapter_id.is_empty() {
            index.by_id.insert(adapter_id.to_string(), weak.clone());
        }
        for endpoint in adapter.endpoints() {
            index.by_endpoint.insert(endpoint.clone(), weak.clone());
        }
        debug!(adapter = %adapter.name(), adapter_id, endpoints = adapter.endpoints().len(), "Published");
        Ok(())
    }

    /// Removes every entry pointing at `adapter`, in one step.
    pub fn unregister(&self, adapter: &ObjectAdapter) {
        let mut index = self.index.write();
        index.by_id.retain(|_, entry| !held_by(entry, adapter));
        index.by_endpoint.retain(|_, entry| !held_by(entry, adapter));
        debug!(adapter = %adapter.name(), "Unpublished");
    }

    pub fn lookup_by_adapter_id(&self, adapter_id: &str) -> Option<Arc<ObjectAdapter>> {
        self.index.read().by_id.get(adapter_id).and_then(Weak::upgrade)
    }

    pub fn lookup_by_endpoint(&self, endpoint: &Endpoint) -> Option<Arc<ObjectAdapter>> {
        self.index.read().by_endpoint.get(endpoint).and_then(Weak::upgrade)
    }

    /// Distinct published adapters, in no particular order.
    pub fn adapters(&self) -> Vec<Arc<ObjectAdapter>> {
        let index = self.index.read();
        let mut adapters: Vec<Arc<ObjectAdapter>> = Vec::new();
        for adapter in index.by_id.values().chain(index.by_endpoint.values()).filter_map(Weak::upgrade) {
            if !adapters.iter().any(|seen| Arc::ptr_eq(seen, &adapter)) {
                adapters.push(adapter);
            }
        }
        adapters
    }

    pub fn is_empty(&self) -> bool {
        let index = self.index.read();
        index.by_id.is_empty() && index.by_endpoint.is_empty()
    }

    /// Drops every entry; used at shutdown.
    pub fn clear(&self) {
        let mut index = self.index.write();
        index.by_id.clear();
        index.by_endpoint.clear();
    }
}
