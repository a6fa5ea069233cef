//! # colloc-rpc
//!
//! > **Collocated dispatch for an object-RPC runtime.**
//!
//! Clients talk to objects through proxies. When the object lives in the same
//! process, behind an object adapter owned by the same [`Communicator`](runtime::Communicator),
//! the call skips marshaling and the transport entirely and runs the servant
//! directly in the caller's task. Otherwise it takes the remote path. Either
//! way the caller sees the same results and the same failures.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Two paths, one contract
//! The [`Dispatcher`](invocation::Dispatcher) decides per call. Collocation is
//! an optimization only: a value or an [`ApplicationException`](invocation::ApplicationException)
//! returned collocated is exactly the one the remote path would have produced.
//!
//! ### Lifecycle gates dispatch
//! Every [`ObjectAdapter`](adapter::ObjectAdapter) moves through
//! `Created → Activated → Deactivated`. The [`CollocationPolicy`](adapter::CollocationPolicy)
//! decides from which state on an adapter is visible to collocation, and
//! deactivation drains in-flight calls before it returns.
//!
//! ### No globals
//! The [`AdapterDirectory`](directory::AdapterDirectory) is a value owned by a
//! communicator and shared by `Arc`. Two communicators in one process never see
//! each other's adapters, which is what lets the tests run a "server" and a
//! "client" side by side over the loopback transport.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. Addressing ([`identity`], [`proxy`])
//! - **Role**: names objects and describes how to reach them.
//! - **Key items**: [`Identity`](identity::Identity), [`Proxy`](proxy::Proxy),
//!   [`Endpoint`](proxy::Endpoint), [`InvocationConfig`](proxy::InvocationConfig).
//!
//! ### 2. Server side ([`servant`], [`adapter`], [`directory`])
//! - **Role**: servants registered by identity on adapters, adapters published
//!   by adapter id and endpoint.
//! - **Key items**: [`Servant`](servant::Servant), [`ServantRegistry`](servant::ServantRegistry),
//!   [`ObjectAdapter`](adapter::ObjectAdapter).
//!
//! ### 3. The Engine ([`resolver`], [`invocation`])
//! - **Role**: finds a collocated servant for a proxy, then runs the call on
//!   the right path.
//! - **Key items**: [`CollocationResolver`](resolver::CollocationResolver),
//!   [`Dispatcher`](invocation::Dispatcher), [`InvocationError`](invocation::InvocationError).
//!
//! ### 4. Seams ([`transport`])
//! - **Role**: the traits the remote path depends on, plus in-memory
//!   implementations in [`transport::mock`].
//!
//! ### 5. The Orchestrator ([`runtime`]) and the Interface ([`clients`])
//! - **Role**: the communicator wires everything together from
//!   [`Properties`](runtime::Properties); clients wrap proxies with serde
//!   conversions.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the collocation demo with info logs
//! RUST_LOG=info cargo run
//!
//! # Run the tests
//! cargo test
//! ```

pub mod adapter;
pub mod clients;
pub mod directory;
pub mod identity;
pub mod invocation;
pub mod proxy;
pub mod resolver;
pub mod runtime;
pub mod servant;
pub mod transport;
