use async_trait::async_trait;

use super::error::BackendError;
use super::types::{BackendKind, ProvisionRequest, RemoteServer};

/// A compute backend the server registry provisions through.
///
/// One adapter instance is active per process, chosen by
/// [`build_adapter`](super::build_adapter).
#[async_trait]
pub trait ServerAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// All instances the backend currently knows about.
    async fn list_servers(&self) -> Result<Vec<RemoteServer>, BackendError>;

    /// A single instance by its backend-native id.
    async fn get_server(&self, id: &str) -> Result<RemoteServer, BackendError>;

    async fn create_server(&self, req: &ProvisionRequest) -> Result<RemoteServer, BackendError>;
}
