pub mod registry;

use serde::{Deserialize, Serialize};

use crate::compute::{BackendKind, RemoteServer};

pub use registry::ServerRegistry;

/// A compute host tracked by the registry.
///
/// `id` is the backend's native id plus a random suffix, so the same
/// instance seen by two processes never collides. Never mutated after
/// insertion: `status` is the snapshot taken when the server was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub remote_id: String,
    #[serde(rename = "type")]
    pub kind: BackendKind,
    pub status: String,
    pub ip: String,
}

impl Server {
    pub fn from_remote(id: String, remote: RemoteServer) -> Self {
        Self {
            id,
            name: remote.name,
            remote_id: remote.id,
            kind: remote.kind,
            status: remote.status,
            ip: remote.ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_as_type() {
        let server = Server::from_remote(
            "42abcdef".into(),
            RemoteServer {
                id: "42".into(),
                name: "jcs-abcdef".into(),
                kind: BackendKind::Hetzner,
                status: "running".into(),
                ip: "1.2.3.4".into(),
            },
        );
        let json = serde_json::to_value(&server).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "42abcdef",
                "name": "jcs-abcdef",
                "remote_id": "42",
                "type": "hetzner",
                "status": "running",
                "ip": "1.2.3.4",
            })
        );
    }
}
