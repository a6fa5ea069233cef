//! Runtime orchestration and lifecycle management.
//!
//! This module contains the process context that ties the core together:
//!
//! - **[`Communicator`]**: owns the adapter directory and the dispatcher,
//!   creates adapters from [`Properties`], turns strings into proxies and shuts
//!   everything down.
//! - **[`Properties`]**: string configuration.
//! - **[`setup_tracing`]**: initializes the tracing/logging infrastructure.

pub mod communicator;
pub mod properties;
pub mod tracing;

pub use communicator::*;
pub use properties::Properties;
pub use self::tracing::setup_tracing;

use thiserror::Error;

use crate::adapter::AdapterError;
use crate::proxy::ParseError;

/// Errors raised by the communicator and its configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("an object adapter named `{0}` already exists")]
    AdapterNameInUse(String),

    #[error("communicator has been destroyed")]
    CommunicatorDestroyed,

    #[error("invalid value `{value}` for property `{key}`")]
    InvalidProperty { key: String, value: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
