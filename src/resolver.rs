//! Collocation resolution.
//!
//! Run once per invocation attempt. Given a [`Proxy`], find an in-process
//! adapter that publishes the proxy's target *and* is in a state that accepts
//! dispatch *and* holds a servant for the proxy's identity. Matching is never by
//! identity alone: a proxy for an object in another process must not be
//! misrouted to a local servant that happens to share its identity.

use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::adapter::ObjectAdapter;
use crate::directory::AdapterDirectory;
use crate::proxy::{Proxy, Target};
use crate::servant::Servant;

/// A collocated adapter and the servant it resolved for the proxy's identity.
#[derive(Clone)]
pub struct CollocatedTarget {
    pub adapter: Arc<ObjectAdapter>,
    pub servant: Arc<dyn Servant>,
}

impl fmt::Debug for CollocatedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollocatedTarget")
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Collocated(CollocatedTarget),
    NoMatch,
}

impl Resolution {
    pub fn is_collocated(&self) -> bool {
        matches!(self, Resolution::Collocated(_))
    }
}

#[derive(Debug, Clone)]
pub struct CollocationResolver {
    directory: Arc<AdapterDirectory>,
}

impl CollocationResolver {
    pub fn new(directory: Arc<AdapterDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<AdapterDirectory> {
        &self.directory
    }

    /// Published adapters matching the proxy's target, in target order and
    /// without duplicates. State is not checked here.
    pub fn candidates(&self, proxy: &Proxy) -> Vec<Arc<ObjectAdapter>> {
        match proxy.target() {
            Target::AdapterId(adapter_id) => self.directory.lookup_by_adapter_id(adapter_id).into_iter().collect(),
            Target::Endpoints(_) => {
                let mut adapters: Vec<Arc<ObjectAdapter>> = Vec::new();
                for endpoint in proxy.usable_endpoints() {
                    if let Some(adapter) = self.directory.lookup_by_endpoint(&endpoint) {
                        if !adapters.iter().any(|seen| Arc::ptr_eq(seen, &adapter)) {
                            adapters.push(adapter);
                        }
                    }
                }
                adapters
            }
        }
    }

    pub fn resolve(&self, proxy: &Proxy) -> Resolution {
        if !proxy.config().collocation_optimized {
            return Resolution::NoMatch;
        }

        for adapter in self.candidates(proxy) {
            if !adapter.accepts_dispatch() {
                trace!(adapter = %adapter.name(), state = ?adapter.state(), "Skipping ineligible adapter");
                continue;
            }
            if let Some(servant) = adapter.find(proxy.identity()) {
                trace!(adapter = %adapter.name(), identity = %proxy.identity(), "Collocated match");
                return Resolution::Collocated(CollocatedTarget { adapter, servant });
            }
        }
        Resolution::NoMatch
    }
}
