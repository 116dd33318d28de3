use std::fmt;

use serde::{Deserialize, Serialize};

// ── Backend kind ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Local,
    Hetzner,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Hetzner => "hetzner",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Instances ───────────────────────────────────────────────────────

/// A compute instance as reported by a backend. Translated into a
/// registry `Server` immediately; never stored as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteServer {
    pub id: String,
    pub name: String,
    pub kind: BackendKind,
    pub status: String,
    pub ip: String,
}

/// Input to `ServerAdapter::create_server`.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub name: String,
    pub server_type: String,
    pub image: String,
}

/// Machine size and base image used for every provisioned server.
/// Fixed per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionDefaults {
    pub server_type: String,
    pub image: String,
}

impl Default for ProvisionDefaults {
    fn default() -> Self {
        Self {
            server_type: "cpx21".into(),
            image: "ubuntu-24.04".into(),
        }
    }
}

impl ProvisionDefaults {
    pub fn request(&self, name: &str) -> ProvisionRequest {
        ProvisionRequest {
            name: name.to_string(),
            server_type: self.server_type.clone(),
            image: self.image.clone(),
        }
    }
}

// ── Runtime config ──────────────────────────────────────────────────

/// Which backend the process provisions through.
#[derive(Debug, Clone)]
pub enum ComputeConfig {
    Local,
    Hetzner(HetznerConfig),
}

impl ComputeConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local => BackendKind::Local,
            Self::Hetzner(_) => BackendKind::Hetzner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HetznerConfig {
    pub api_base_url: String,
    /// Bearer token; calls fail with a configuration error while unset.
    pub api_key: Option<String>,
}

pub const HETZNER_API_URL: &str = "https://api.hetzner.cloud/v1";
