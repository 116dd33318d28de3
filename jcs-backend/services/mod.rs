pub mod placement;
pub mod registry;
pub mod service;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use registry::ServiceRegistry;
pub use service::{Fleet, Service};

/// A workload sandbox running on one server, owned by one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub service_id: String,
    pub server_id: String,
    /// Id assigned by the host agent.
    pub sandbox_id: String,
    /// Preview URL returned by the agent.
    pub host: String,
    pub image_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    /// Last status reported by the agent.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of a service and its containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub containers: BTreeMap<String, Container>,
}
