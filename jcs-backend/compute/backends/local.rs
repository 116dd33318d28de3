use async_trait::async_trait;

use crate::compute::adapter::ServerAdapter;
use crate::compute::error::BackendError;
use crate::compute::types::*;

const LOCALHOST: &str = "localhost";

/// Development backend: the current host is the only server.
///
/// Never touches the network. `create_server` hands back a logical
/// instance that also points at localhost.
pub struct LocalServerAdapter;

fn local_server(id: String, name: String) -> RemoteServer {
    RemoteServer {
        id,
        name,
        kind: BackendKind::Local,
        status: "online".into(),
        ip: LOCALHOST.into(),
    }
}

#[async_trait]
impl ServerAdapter for LocalServerAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn list_servers(&self) -> Result<Vec<RemoteServer>, BackendError> {
        Ok(vec![local_server(LOCALHOST.into(), LOCALHOST.into())])
    }

    async fn get_server(&self, id: &str) -> Result<RemoteServer, BackendError> {
        if id != LOCALHOST {
            return Err(BackendError::NotFound(id.to_string()));
        }
        Ok(local_server(LOCALHOST.into(), LOCALHOST.into()))
    }

    async fn create_server(&self, req: &ProvisionRequest) -> Result<RemoteServer, BackendError> {
        tracing::debug!(name = %req.name, "synthesizing local server");
        Ok(local_server(format!("{LOCALHOST}-{}", req.name), req.name.clone()))
    }
}
