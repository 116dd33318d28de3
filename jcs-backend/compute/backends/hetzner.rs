//! Hetzner Cloud compute backend.
//!
//! Thin mapping layer over [`HetznerClient`]: Hetzner's integer ids become
//! strings and `public_net.ipv4.ip` becomes the server address the host
//! agent is reached on.

use async_trait::async_trait;

use crate::compute::adapter::ServerAdapter;
use crate::compute::error::BackendError;
use crate::compute::hetzner::{HetznerClient, HetznerCreateServerRequest, HetznerServer};
use crate::compute::types::*;

pub struct HetznerServerAdapter {
    client: HetznerClient,
}

impl HetznerServerAdapter {
    pub fn new(client: HetznerClient) -> Self {
        Self { client }
    }
}

fn to_remote(server: HetznerServer) -> RemoteServer {
    RemoteServer {
        id: server.id.to_string(),
        name: server.name,
        kind: BackendKind::Hetzner,
        status: server.status,
        ip: server.public_net.ipv4.ip,
    }
}

#[async_trait]
impl ServerAdapter for HetznerServerAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Hetzner
    }

    async fn list_servers(&self) -> Result<Vec<RemoteServer>, BackendError> {
        let resp = self.client.list_servers().await?;
        Ok(resp.servers.into_iter().map(to_remote).collect())
    }

    async fn get_server(&self, id: &str) -> Result<RemoteServer, BackendError> {
        let resp = self.client.get_server(id).await?;
        Ok(to_remote(resp.server))
    }

    async fn create_server(&self, req: &ProvisionRequest) -> Result<RemoteServer, BackendError> {
        let body = HetznerCreateServerRequest {
            name: req.name.clone(),
            server_type: req.server_type.clone(),
            image: req.image.clone(),
        };
        let resp = self.client.create_server(&body).await?;
        Ok(to_remote(resp.server))
    }
}
