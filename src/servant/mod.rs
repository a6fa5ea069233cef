//! Servants and the per-adapter servant registry.
//!
//! A servant is the in-process handler behind an object. Any type implementing
//! [`Servant`] qualifies; there is no base type to inherit from.

pub mod error;
pub mod registry;

pub use error::*;
pub use registry::*;

use async_trait::async_trait;
use serde_json::Value;

use crate::identity::Identity;
use crate::invocation::ApplicationException;
use crate::proxy::Mode;

/// Per-call information handed to a servant.
#[derive(Debug, Clone, PartialEq)]
pub struct Current {
    /// Name of the adapter that dispatched the call.
    pub adapter: String,
    pub identity: Identity,
    pub operation: String,
    pub mode: Mode,
    /// `true` when the call never left the process.
    pub collocated: bool,
}

/// The capability every servant provides: receive an invocation by operation
/// name and argument payload, and return a result or an application failure.
///
/// # Async & Context
/// Collocated calls run `dispatch` inside the caller's task, so a servant that
/// blocks the thread blocks its caller too.
#[async_trait]
pub trait Servant: Send + Sync + 'static {
    async fn dispatch(&self, current: &Current, args: Value) -> Result<Value, ApplicationException>;
}
