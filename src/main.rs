//! # Collocation demo
//!
//! Registers a servant on an adapter that is never activated and invokes it
//! through a proxy. Under the `OnCreation` policy the call is served
//! collocated; under the default `RequireActivation` policy it falls through
//! to the (absent) network and fails.
//!
//! ```bash
//! RUST_LOG=debug cargo run
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, Instrument};

use colloc_rpc::identity::Identity;
use colloc_rpc::invocation::ApplicationException;
use colloc_rpc::runtime::{setup_tracing, Communicator, Properties};
use colloc_rpc::servant::{Current, Servant};

const TEST_ENDPOINT: &str = "tcp -h 127.0.0.1 -p 12010";

/// Echoes sequences back, the way the sequence-mapping test servant does:
/// the result is `[input, input]` (return value and out parameter).
struct MyClass;

#[async_trait]
impl Servant for MyClass {
    async fn dispatch(&self, current: &Current, args: Value) -> Result<Value, ApplicationException> {
        match current.operation.as_str() {
            "opSeq" => Ok(json!([args.clone(), args])),
            "shutdown" => Ok(Value::Null),
            other => Err(ApplicationException::new("::Ice::OperationNotExistException", other)),
        }
    }
}

async fn run(policy: &str) -> Result<(), String> {
    let properties = Properties::new()
        .with("Collocation.Policy", policy)
        .with("TestAdapter.Endpoints", TEST_ENDPOINT);
    let communicator = Communicator::builder()
        .properties(properties)
        .build()
        .map_err(|e| e.to_string())?;

    let adapter = communicator
        .create_object_adapter("TestAdapter")
        .map_err(|e| e.to_string())?;
    adapter
        .add(Identity::named("test"), Arc::new(MyClass))
        .map_err(|e| e.to_string())?;
    // adapter deliberately left inactive

    let proxy = communicator
        .string_to_proxy(&format!("test:{TEST_ENDPOINT}"))
        .map_err(|e| e.to_string())?;
    let client = communicator.client(proxy);

    match client.call::<_, Value>("opSeq", &[1u8, 2, 3]).await {
        Ok(result) => info!(%result, "opSeq answered"),
        Err(e) => error!(error = %e, "opSeq failed"),
    }

    let stats = communicator.dispatcher().metrics().snapshot();
    info!(
        collocated = stats.collocated_dispatches,
        remote = stats.remote_dispatches,
        marshal_calls = stats.marshal_calls,
        "Dispatch statistics"
    );

    communicator.destroy().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting collocation demo");

    for policy in ["OnCreation", "RequireActivation"] {
        let span = tracing::info_span!("policy", name = policy);
        run(policy).instrument(span).await?;
    }

    info!("Demo completed");
    Ok(())
}
