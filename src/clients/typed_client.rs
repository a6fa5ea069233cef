use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ClientError, ObjectClient};

/// Trait for interface-specific clients to inherit the standard operations.
///
/// Implementors wrap an [`ObjectClient`] and pick their own error type;
/// `ping` and `call` come for free.
///
/// ```ignore
/// struct SequenceClient { inner: ObjectClient }
///
/// impl TypedClient for SequenceClient {
///     type Error = ClientError;
///     fn inner(&self) -> &ObjectClient { &self.inner }
///     fn map_error(e: ClientError) -> ClientError { e }
/// }
/// ```
#[async_trait]
pub trait TypedClient: Send + Sync {
    /// The interface-specific error type.
    type Error: Send;

    /// Access the inner untyped client.
    fn inner(&self) -> &ObjectClient;

    /// Map client errors to the interface error type.
    fn map_error(e: ClientError) -> Self::Error;

    #[tracing::instrument(skip(self))]
    async fn ping(&self) -> Result<(), Self::Error> {
        self.inner()
            .ping()
            .await
            .map_err(|e| Self::map_error(ClientError::from(e)))
    }

    async fn call<A, R>(&self, operation: &str, args: &A) -> Result<R, Self::Error>
    where
        A: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        self.inner().call(operation, args).await.map_err(Self::map_error)
    }
}
