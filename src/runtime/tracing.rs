/// Initializes the tracing/logging infrastructure for the application.
///
/// This sets up structured logging using the `tracing` crate with:
/// - **Environment-based filtering**: Controlled via `RUST_LOG` environment variable
/// - **Compact formatting**: spans shown inline, module paths hidden
///
/// # Environment Variables
///
/// - `RUST_LOG=info` - adapter lifecycle (created, activated, deactivating)
/// - `RUST_LOG=debug` - every dispatch, with the path it took
/// - `RUST_LOG=trace` - collocation resolution decisions
/// - `RUST_LOG=colloc_rpc::invocation=debug` - dispatcher only
///
/// # Example
///
/// ```ignore
/// setup_tracing();
/// tracing::info!("Application started");
/// ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
