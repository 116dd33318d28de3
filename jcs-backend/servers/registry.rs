use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::Server;
use crate::compute::{BackendKind, ProvisionDefaults, RemoteServer, ServerAdapter};
use crate::error::ControlError;
use crate::ids::unique_id;

/// Authoritative set of known servers.
///
/// The only writer of the server map. Server ids are generated and inserted
/// under one write lock; server names are reserved before the backend call
/// so two concurrent creates of the same name cannot both reach the backend.
pub struct ServerRegistry {
    adapter: Arc<dyn ServerAdapter>,
    defaults: ProvisionDefaults,
    servers: RwLock<HashMap<String, Server>>,
    /// Names with a backend create in flight.
    pending_names: StdMutex<HashSet<String>>,
    /// Live containers per server id, read by placement strategies.
    placements: RwLock<HashMap<String, usize>>,
    provisioning: Mutex<()>,
}

/// Drops the name reservation even if the create future is abandoned.
struct NameReservation<'a> {
    pending: &'a StdMutex<HashSet<String>>,
    name: String,
}

impl Drop for NameReservation<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}

impl ServerRegistry {
    pub fn new(adapter: Arc<dyn ServerAdapter>, defaults: ProvisionDefaults) -> Self {
        Self {
            adapter,
            defaults,
            servers: RwLock::new(HashMap::new()),
            pending_names: StdMutex::new(HashSet::new()),
            placements: RwLock::new(HashMap::new()),
            provisioning: Mutex::new(()),
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.adapter.kind()
    }

    /// Seed the registry from the backend's current instances.
    ///
    /// A failed listing is logged and leaves the registry empty. Returns the
    /// number of servers recorded.
    pub async fn initialize(&self) -> usize {
        let remotes = match self.adapter.list_servers().await {
            Ok(remotes) => remotes,
            Err(e) => {
                tracing::warn!(
                    backend = %self.adapter.kind(),
                    error = %e,
                    "failed to list servers at startup, starting with an empty registry"
                );
                return 0;
            }
        };

        let mut servers = self.servers.write().await;
        let mut seeded = 0;
        for remote in remotes {
            let remote_id = remote.id.clone();
            match insert_remote(&mut servers, remote) {
                Ok(server) => {
                    tracing::debug!(server_id = %server.id, ip = %server.ip, "seeded server");
                    seeded += 1;
                }
                Err(e) => {
                    tracing::warn!(remote_id = %remote_id, error = %e, "skipping server");
                }
            }
        }

        tracing::info!(count = seeded, backend = %self.adapter.kind(), "loaded servers");
        seeded
    }

    pub async fn get(&self, id: &str) -> Result<Server, ControlError> {
        self.servers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ControlError::not_found("server", id))
    }

    /// All servers, ordered by id.
    pub async fn list(&self) -> Vec<Server> {
        let mut servers: Vec<Server> = self.servers.read().await.values().cloned().collect();
        servers.sort_by(|a, b| a.id.cmp(&b.id));
        servers
    }

    /// Provision a new server through the backend and record it.
    pub async fn create(&self, name: &str) -> Result<Server, ControlError> {
        let _reservation = {
            let servers = self.servers.read().await;
            let mut pending = self
                .pending_names
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if servers.values().any(|s| s.name == name) || !pending.insert(name.to_string()) {
                return Err(ControlError::conflict("server", name));
            }
            NameReservation {
                pending: &self.pending_names,
                name: name.to_string(),
            }
        };

        let remote = self
            .adapter
            .create_server(&self.defaults.request(name))
            .await?;

        let server = insert_remote(&mut *self.servers.write().await, remote)?;
        tracing::info!(
            server_id = %server.id,
            name = %server.name,
            ip = %server.ip,
            backend = %server.kind,
            "provisioned server"
        );
        Ok(server)
    }

    /// Forget a server. The backend instance is left running.
    pub async fn delete(&self, id: &str) -> Result<(), ControlError> {
        let removed = self.servers.write().await.remove(id);
        let Some(server) = removed else {
            return Err(ControlError::not_found("server", id));
        };
        self.placements.write().await.remove(id);
        tracing::info!(
            server_id = %server.id,
            remote_id = %server.remote_id,
            "removed server from registry (backend instance not torn down)"
        );
        Ok(())
    }

    /// Serializes "list, and provision if empty" across concurrent callers.
    pub async fn provisioning_guard(&self) -> MutexGuard<'_, ()> {
        self.provisioning.lock().await
    }

    pub async fn record_placement(&self, server_id: &str) {
        *self
            .placements
            .write()
            .await
            .entry(server_id.to_string())
            .or_default() += 1;
    }

    pub async fn release_placement(&self, server_id: &str) {
        let mut placements = self.placements.write().await;
        if let Some(count) = placements.get_mut(server_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                placements.remove(server_id);
            }
        }
    }

    /// Live container count per server id. Servers without containers are absent.
    pub async fn load(&self) -> HashMap<String, usize> {
        self.placements.read().await.clone()
    }
}

/// Give `remote` a registry id (`native id + hex suffix`) and insert it.
fn insert_remote(
    servers: &mut HashMap<String, Server>,
    remote: RemoteServer,
) -> Result<Server, ControlError> {
    let id = unique_id("server", &remote.id, |candidate| servers.contains_key(candidate))?;
    let server = Server::from_remote(id, remote);
    servers.insert(server.id.clone(), server.clone());
    Ok(server)
}
