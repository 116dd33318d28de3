use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::error::AgentError;
use super::{AgentConfig, Sandbox, SandboxAgent, SandboxCreateRequest};
use crate::http::encode_segment;

/// reqwest-backed agent client shared by every service.
///
/// The semaphore caps concurrent agent calls across all hosts.
#[derive(Debug, Clone)]
pub struct HttpSandboxAgent {
    client: reqwest::Client,
    config: AgentConfig,
    permits: Arc<Semaphore>,
}

impl HttpSandboxAgent {
    pub fn new(client: reqwest::Client, config: AgentConfig, max_in_flight: usize) -> Self {
        Self {
            client,
            config,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    async fn send(&self, url: &str, req: reqwest::RequestBuilder) -> Result<Sandbox, AgentError> {
        let _permit = self.permits.acquire().await.map_err(|_| AgentError::Transport {
            url: url.to_string(),
            reason: "request limiter closed".into(),
        })?;

        let resp = req
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Sandbox>()
            .await
            .map_err(|e| AgentError::from_reqwest(url, e))
    }
}

#[async_trait]
impl SandboxAgent for HttpSandboxAgent {
    async fn create_sandbox(
        &self,
        host: &str,
        req: &SandboxCreateRequest,
    ) -> Result<Sandbox, AgentError> {
        let url = format!("{}/sandboxes", self.config.base_url(host));

        tracing::info!(
            url = %url,
            image = %req.image_name,
            "creating sandbox via host agent"
        );

        let sandbox = self.send(&url, self.client.post(&url).json(req)).await?;

        tracing::info!(
            sandbox_id = %sandbox.id,
            status = %sandbox.status,
            preview_url = %sandbox.preview_url,
            "sandbox created"
        );

        Ok(sandbox)
    }

    async fn get_sandbox(&self, host: &str, sandbox_id: &str) -> Result<Sandbox, AgentError> {
        let url = format!(
            "{}/sandboxes/{}",
            self.config.base_url(host),
            encode_segment(sandbox_id)
        );
        match self.send(&url, self.client.get(&url)).await {
            Err(AgentError::Status { status: 404, .. }) => {
                Err(AgentError::NotFound(sandbox_id.to_string()))
            }
            other => other,
        }
    }
}
