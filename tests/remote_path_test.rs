use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use colloc_rpc::identity::Identity;
use colloc_rpc::invocation::{ApplicationException, InvocationError};
use colloc_rpc::proxy::Endpoint;
use colloc_rpc::runtime::{Communicator, Properties};
use colloc_rpc::servant::{Current, Servant};
use colloc_rpc::transport::mock::{LoopbackTransport, StaticLocator, UnresponsiveTransport};
use colloc_rpc::transport::TransportError;

const ENDPOINT: &str = "tcp -h 127.0.0.1 -p 12010";

struct Sequences;

#[async_trait]
impl Servant for Sequences {
    async fn dispatch(&self, current: &Current, args: Value) -> Result<Value, ApplicationException> {
        match current.operation.as_str() {
            "opSeq" => Ok(json!([args.clone(), args])),
            "opFail" => Err(ApplicationException::new("::Test::SeqError", "no sequences today")
                .with_payload(json!({ "requested": args }))),
            other => Err(ApplicationException::new("::Test::Unknown", other)),
        }
    }
}

/// A server communicator with one active adapter, and a client communicator
/// that reaches it through the loopback transport.
fn server_and_client() -> (Communicator, Communicator, LoopbackTransport) {
    let server = Communicator::builder()
        .properties(Properties::new().with("TestAdapter.Endpoints", ENDPOINT))
        .build()
        .expect("Failed to build server");
    let adapter = server.create_object_adapter("TestAdapter").unwrap();
    adapter.add(Identity::named("test"), Arc::new(Sequences)).unwrap();
    adapter.activate().unwrap();

    let loopback = LoopbackTransport::new(Arc::clone(server.directory()));
    let client = Communicator::builder()
        .transport(Arc::new(loopback.clone()))
        .build()
        .expect("Failed to build client");
    (server, client, loopback)
}

/// Collocated and remote invocations of the same operation are
/// indistinguishable to the caller, for values and for exceptions.
#[tokio::test]
async fn collocated_and_remote_calls_agree() {
    let (server, client, loopback) = server_and_client();
    let proxy_string = format!("test:{ENDPOINT}");
    let local = server.string_to_proxy(&proxy_string).unwrap();
    let remote = client.string_to_proxy(&proxy_string).unwrap();

    for args in [json!([]), json!([1, 2, 3]), json!(["x", null, { "k": 1.5 }])] {
        let collocated = server.invoke(&local, "opSeq", args.clone()).await;
        let over_the_wire = client.invoke(&remote, "opSeq", args).await;
        assert_eq!(collocated, over_the_wire);
    }

    let collocated = server.invoke(&local, "opFail", json!([7])).await.unwrap_err();
    let over_the_wire = client.invoke(&remote, "opFail", json!([7])).await.unwrap_err();
    assert_eq!(collocated, over_the_wire);
    assert!(matches!(collocated, InvocationError::Application(ref e) if e.type_id == "::Test::SeqError"));

    assert_eq!(loopback.served(), 4);
    assert_eq!(server.dispatcher().metrics().snapshot().marshal_calls, 0);
    assert_eq!(client.dispatcher().metrics().snapshot().collocated_dispatches, 0);
}

/// Disabling collocation on a proxy forces the remote path even when a
/// matching adapter is in process.
#[tokio::test]
async fn collocation_can_be_disabled_per_proxy_and_by_default() {
    let (server, _client, _loopback) = server_and_client();
    let proxy = server
        .string_to_proxy(&format!("test:{ENDPOINT}"))
        .unwrap()
        .with_collocation_optimized(false);
    // the server's own transport refuses everything
    assert!(matches!(
        server.invoke(&proxy, "opSeq", json!([])).await,
        Err(InvocationError::TransportFailure(_))
    ));

    let forced = Communicator::builder()
        .properties(
            Properties::new()
                .with("Default.CollocationOptimized", "0")
                .with("Local.Endpoints", "tcp -p 12011"),
        )
        .build()
        .unwrap();
    let adapter = forced.create_object_adapter("Local").unwrap();
    adapter.add(Identity::named("test"), Arc::new(Sequences)).unwrap();
    adapter.activate().unwrap();
    let proxy = forced.string_to_proxy("test:tcp -p 12011").unwrap();
    assert!(!proxy.config().collocation_optimized);
    assert!(forced.invoke(&proxy, "opSeq", json!([])).await.is_err());
    assert_eq!(forced.dispatcher().metrics().snapshot().collocated_dispatches, 0);
}

/// Remote objects that do not exist are reported as such, not as a missing
/// route.
#[tokio::test]
async fn unknown_remote_identity_is_object_not_exist() {
    let (_server, client, _loopback) = server_and_client();
    let proxy = client.string_to_proxy(&format!("ghost:{ENDPOINT}")).unwrap();
    let err = client.invoke(&proxy, "opSeq", json!([])).await.unwrap_err();
    assert_eq!(
        err,
        InvocationError::ObjectNotExist {
            identity: Identity::named("ghost"),
            operation: "opSeq".into(),
        }
    );
}

/// Indirect proxies are resolved through the locator on the remote path.
#[tokio::test]
async fn indirect_proxies_go_through_the_locator() {
    let server = Communicator::builder()
        .properties(
            Properties::new()
                .with("TestAdapter.Endpoints", ENDPOINT)
                .with("TestAdapter.AdapterId", "TestAdapter"),
        )
        .build()
        .unwrap();
    let adapter = server.create_object_adapter("TestAdapter").unwrap();
    adapter.add(Identity::named("test"), Arc::new(Sequences)).unwrap();
    adapter.activate().unwrap();

    let locator = StaticLocator::new().with_adapter("TestAdapter", vec![ENDPOINT.parse::<Endpoint>().unwrap()]);
    let client = Communicator::builder()
        .transport(Arc::new(LoopbackTransport::new(Arc::clone(server.directory()))))
        .locator(Arc::new(locator))
        .build()
        .unwrap();

    let proxy = client.string_to_proxy("test @ TestAdapter").unwrap();
    let result = client.invoke(&proxy, "opSeq", json!([true])).await.unwrap();
    assert_eq!(result, Some(json!([[true], [true]])));

    let unknown = client.string_to_proxy("test @ Elsewhere").unwrap();
    assert!(matches!(
        client.invoke(&unknown, "opSeq", json!([])).await,
        Err(InvocationError::NoSuchObject { .. })
    ));
}

/// A 10ms timeout against a transport that never answers fails promptly with
/// `Timeout`, releases the pending request and leaves the server untouched.
#[tokio::test]
async fn unresponsive_transport_times_out() {
    let (server, _client, _loopback) = server_and_client();
    let unresponsive = Arc::new(UnresponsiveTransport::new());
    let client = Communicator::builder()
        .properties(Properties::new().with("Default.InvocationTimeout", "10"))
        .transport(unresponsive.clone())
        .build()
        .unwrap();

    let proxy = client.string_to_proxy(&format!("test:{ENDPOINT}")).unwrap();
    let started = Instant::now();
    let err = client.invoke(&proxy, "opSeq", json!([])).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, InvocationError::Timeout(Duration::from_millis(10)));
    assert!(elapsed >= Duration::from_millis(10));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    assert_eq!(unresponsive.sent(), 1);
    assert_eq!(unresponsive.pending(), 0);
    assert_eq!(client.dispatcher().metrics().snapshot().timeouts, 1);

    let adapter = server.find_object_adapter("TestAdapter").unwrap();
    assert!(adapter.find(&Identity::named("test")).is_some());
    assert!(server.directory().lookup_by_endpoint(&ENDPOINT.parse().unwrap()).is_some());
}

/// A collocated call never waits on the timeout machinery.
#[tokio::test]
async fn collocated_calls_ignore_the_timeout() {
    let (server, _client, _loopback) = server_and_client();
    let proxy = server
        .string_to_proxy(&format!("test:{ENDPOINT}"))
        .unwrap()
        .with_timeout(Some(Duration::from_millis(1)));
    let result = server.invoke(&proxy, "opSeq", json!([1])).await.unwrap();
    assert_eq!(result, Some(json!([[1], [1]])));
    assert_eq!(server.dispatcher().metrics().snapshot().timeouts, 0);
}

/// Under `OnCreation` a never-activated adapter serves its own process but
/// does not answer the network.
#[tokio::test]
async fn never_activated_adapter_does_not_answer_remote_calls() {
    let server = Communicator::builder()
        .properties(
            Properties::new()
                .with("Collocation.Policy", "OnCreation")
                .with("TestAdapter.Endpoints", ENDPOINT),
        )
        .build()
        .unwrap();
    let adapter = server.create_object_adapter("TestAdapter").unwrap();
    adapter.add(Identity::named("test"), Arc::new(Sequences)).unwrap();

    let loopback = LoopbackTransport::new(Arc::clone(server.directory()));
    let client = Communicator::builder()
        .transport(Arc::new(loopback.clone()))
        .build()
        .unwrap();
    let proxy_string = format!("test:{ENDPOINT}");

    let remote = client.string_to_proxy(&proxy_string).unwrap();
    let err = client.invoke(&remote, "opSeq", json!([5])).await.unwrap_err();
    assert!(matches!(
        err,
        InvocationError::TransportFailure(TransportError::ConnectionRefused(_))
    ));
    assert_eq!(loopback.served(), 0);
    assert_eq!(client.dispatcher().metrics().snapshot().remote_dispatches, 1);

    let local = server.string_to_proxy(&proxy_string).unwrap();
    let result = server.invoke(&local, "opSeq", json!([5])).await.unwrap();
    assert_eq!(result, Some(json!([[5], [5]])));

    adapter.activate().unwrap();
    let result = client.invoke(&remote, "opSeq", json!([5])).await.unwrap();
    assert_eq!(result, Some(json!([[5], [5]])));
}
