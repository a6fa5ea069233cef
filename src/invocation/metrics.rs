//! Dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by a [`Dispatcher`](super::Dispatcher). A collocated call
/// never touches `marshal_calls`.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub collocated_dispatches: AtomicU64,
    pub remote_dispatches: AtomicU64,
    pub marshal_calls: AtomicU64,
    pub timeouts: AtomicU64,
    pub transport_failures: AtomicU64,
}

impl DispatchMetrics {
    pub(crate) fn record_collocated(&self) {
        self.collocated_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote(&self) {
        self.remote_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// One marshal or unmarshal step.
    pub(crate) fn record_marshal(&self) {
        self.marshal_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            collocated_dispatches: self.collocated_dispatches.load(Ordering::Relaxed),
            remote_dispatches: self.remote_dispatches.load(Ordering::Relaxed),
            marshal_calls: self.marshal_calls.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub collocated_dispatches: u64,
    pub remote_dispatches: u64,
    pub marshal_calls: u64,
    pub timeouts: u64,
    pub transport_failures: u64,
}
