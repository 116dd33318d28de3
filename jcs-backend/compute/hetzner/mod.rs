//! HTTP client for the Hetzner Cloud servers API.
//!
//! API: GET /servers, GET /servers/{id}, POST /servers
//!
//! Every call needs a bearer token. Without one the client refuses to send
//! anything and returns `BackendError::Configuration`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::compute::error::BackendError;
use crate::http::encode_segment;

// ── Request / Response types ────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HetznerIpv4 {
    pub ip: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HetznerPublicNet {
    pub ipv4: HetznerIpv4,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HetznerServer {
    pub id: u64,
    pub name: String,
    pub status: String,
    pub public_net: HetznerPublicNet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HetznerListServersResponse {
    pub servers: Vec<HetznerServer>,
}

/// Envelope shared by the get and create responses.
#[derive(Debug, Clone, Deserialize)]
pub struct HetznerServerResponse {
    pub server: HetznerServer,
}

#[derive(Debug, Clone, Serialize)]
pub struct HetznerCreateServerRequest {
    pub name: String,
    pub server_type: String,
    pub image: String,
}

// ── Client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HetznerClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl HetznerClient {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        token: Option<String>,
        max_in_flight: usize,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            client,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    fn token(&self) -> Result<&str, BackendError> {
        self.token
            .as_deref()
            .ok_or_else(|| BackendError::Configuration("HETZNER_API_KEY not set".into()))
    }

    pub async fn list_servers(&self) -> Result<HetznerListServersResponse, BackendError> {
        let url = format!("{}/servers", self.base_url);
        self.send(self.client.get(&url), "list servers").await
    }

    pub async fn get_server(&self, id: &str) -> Result<HetznerServerResponse, BackendError> {
        let url = format!("{}/servers/{}", self.base_url, encode_segment(id));
        match self.send(self.client.get(&url), "get server").await {
            Err(BackendError::Status { status: 404, .. }) => {
                Err(BackendError::NotFound(id.to_string()))
            }
            other => other,
        }
    }

    pub async fn create_server(
        &self,
        req: &HetznerCreateServerRequest,
    ) -> Result<HetznerServerResponse, BackendError> {
        let url = format!("{}/servers", self.base_url);

        tracing::info!(
            name = %req.name,
            server_type = %req.server_type,
            image = %req.image,
            "creating server via Hetzner"
        );

        let created: HetznerServerResponse =
            self.send(self.client.post(&url).json(req), "create server").await?;

        tracing::info!(
            hetzner_id = created.server.id,
            status = %created.server.status,
            ip = %created.server.public_net.ipv4.ip,
            "Hetzner server created"
        );

        Ok(created)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, BackendError> {
        let token = self.token()?;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BackendError::Transport("request limiter closed".into()))?;

        let resp = req
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&format!("Hetzner {what} failed"), e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Serde(format!("failed to parse {what} response: {e}"))
            }
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────
