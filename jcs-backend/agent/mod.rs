//! Per-host sandbox agent API.
//!
//! Every server runs an agent that starts workload sandboxes:
//! `POST {base}/sandboxes` and `GET {base}/sandboxes/{id}`, no auth.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::HttpSandboxAgent;
pub use error::AgentError;

#[derive(Debug, Clone, Serialize)]
pub struct SandboxCreateRequest {
    pub image_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
}

/// The agent's view of a running sandbox; source of truth for status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Sandbox {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub websocket_url: String,
}

/// Where agents listen on each server.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// `None` uses the scheme default (80).
    pub port: Option<u16>,
    pub base_path: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: None,
            base_path: "/api".into(),
        }
    }
}

impl AgentConfig {
    /// `http://<host>[:port]<base_path>` without a trailing slash.
    pub fn base_url(&self, host: &str) -> String {
        let path = self.base_path.trim_end_matches('/');
        match self.port {
            Some(port) => format!("http://{host}:{port}{path}"),
            None => format!("http://{host}{path}"),
        }
    }
}

#[async_trait]
pub trait SandboxAgent: Send + Sync {
    /// Start a sandbox on the agent at `host`. Not idempotent.
    async fn create_sandbox(
        &self,
        host: &str,
        req: &SandboxCreateRequest,
    ) -> Result<Sandbox, AgentError>;

    async fn get_sandbox(&self, host: &str, sandbox_id: &str) -> Result<Sandbox, AgentError>;
}
