//! Client-side wrappers around [`Dispatcher::invoke`](crate::invocation::Dispatcher::invoke).
//!
//! Application code rarely calls the dispatcher with raw JSON. An
//! [`ObjectClient`] binds a proxy to a dispatcher and converts arguments and
//! results with serde; a [`TypedClient`] builds an interface-specific client
//! on top of it.

pub mod object_client;
pub mod typed_client;

pub use object_client::*;
pub use typed_client::*;
