use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tokio::sync::RwLock;

use super::placement::PlacementStrategy;
use super::{Container, ServiceRecord};
use crate::agent::{SandboxAgent, SandboxCreateRequest};
use crate::error::ControlError;
use crate::ids::{random_hex, unique_id};
use crate::servers::{Server, ServerRegistry};

/// Prefix for servers provisioned on demand.
pub const SERVER_NAME_PREFIX: &str = "jcs-";

/// Collaborators every service provisions through.
pub struct Fleet {
    pub servers: Arc<ServerRegistry>,
    pub agent: Arc<dyn SandboxAgent>,
    pub placement: Arc<dyn PlacementStrategy>,
}

/// A named group of containers.
///
/// The only writer of its container map. Remote calls happen outside the
/// container lock; only the id-generate-and-insert step holds it.
pub struct Service {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    containers: RwLock<HashMap<String, Container>>,
    /// Set once the service is deleted. Written and read under the
    /// container write lock.
    closed: AtomicBool,
    fleet: Arc<Fleet>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl Service {
    pub(crate) fn new(id: String, name: String, fleet: Arc<Fleet>) -> Self {
        Self {
            id,
            name,
            created_at: Utc::now(),
            containers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            fleet,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot with cached container statuses (no agent calls).
    pub async fn record(&self) -> ServiceRecord {
        let containers = self.containers.read().await;
        ServiceRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            containers: containers
                .iter()
                .map(|(id, c)| (id.clone(), c.clone()))
                .collect(),
        }
    }

    /// Place a new container: pick or provision a server, start a sandbox on
    /// its agent, record the result.
    ///
    /// Nothing is recorded unless the agent call succeeds.
    #[tracing::instrument(skip_all, fields(service_id = %self.id, image = %image_name))]
    pub async fn create_container(
        &self,
        image_name: &str,
        start_command: Option<String>,
    ) -> Result<Container, ControlError> {
        let image_name = image_name.trim();
        if image_name.is_empty() {
            return Err(ControlError::InvalidInput("image_name must not be empty".into()));
        }
        let start_command = start_command.filter(|c| !c.trim().is_empty());
        if self.is_closed() {
            return Err(ControlError::not_found("service", &self.id));
        }

        let server = self.place().await?;

        let req = SandboxCreateRequest {
            image_name: image_name.to_string(),
            start_command: start_command.clone(),
        };
        let sandbox = match self.fleet.agent.create_sandbox(&server.ip, &req).await {
            Ok(sandbox) => sandbox,
            Err(e) => {
                self.fleet.servers.release_placement(&server.id).await;
                tracing::warn!(server_id = %server.id, error = %e, "sandbox creation failed");
                return Err(e.into());
            }
        };

        let sandbox_id = sandbox.id.clone();
        let inserted = {
            let mut containers = self.containers.write().await;
            if self.is_closed() {
                Err(ControlError::not_found("service", &self.id))
            } else {
                unique_id("container", "", |candidate| containers.contains_key(candidate)).map(
                    |id| {
                        let container = Container {
                            id: id.clone(),
                            service_id: self.id.clone(),
                            server_id: server.id.clone(),
                            sandbox_id: sandbox.id,
                            host: sandbox.preview_url,
                            image_name: image_name.to_string(),
                            start_command,
                            status: sandbox.status,
                            created_at: Utc::now(),
                        };
                        containers.insert(id, container.clone());
                        container
                    },
                )
            }
        };
        let container = match inserted {
            Ok(container) => container,
            Err(e) => {
                self.fleet.servers.release_placement(&server.id).await;
                tracing::warn!(
                    server_id = %server.id,
                    sandbox_id = %sandbox_id,
                    error = %e,
                    "sandbox started but not recorded"
                );
                return Err(e);
            }
        };

        tracing::info!(
            container_id = %container.id,
            server_id = %container.server_id,
            sandbox_id = %container.sandbox_id,
            status = %container.status,
            "container created"
        );
        Ok(container)
    }

    /// Choose a server and count the new container against it.
    ///
    /// Runs under the registry's provisioning guard: with no servers
    /// registered, concurrent callers provision exactly one between them.
    async fn place(&self) -> Result<Server, ControlError> {
        let servers = &self.fleet.servers;
        let _guard = servers.provisioning_guard().await;

        let available = servers.list().await;
        let server = if available.is_empty() {
            let name = format!("{SERVER_NAME_PREFIX}{}", random_hex()?);
            tracing::info!(server_name = %name, "no servers registered, provisioning one");
            servers.create(&name).await?
        } else {
            let load = servers.load().await;
            self.fleet
                .placement
                .select(&available, &load)
                .cloned()
                .ok_or_else(|| ControlError::not_found("server", "<any>"))?
        };

        servers.record_placement(&server.id).await;
        tracing::debug!(
            server_id = %server.id,
            strategy = self.fleet.placement.kind().as_str(),
            "placed container"
        );
        Ok(server)
    }

    /// Every container with its status refreshed from its agent, ordered by id.
    ///
    /// All-or-nothing: one unreachable server or agent fails the whole call and
    /// no cached status is updated.
    pub async fn list_containers(&self) -> Result<Vec<Container>, ControlError> {
        let snapshot: Vec<Container> = self.containers.read().await.values().cloned().collect();

        let mut refreshed = try_join_all(snapshot.into_iter().map(|c| self.refresh(c))).await?;
        self.store_statuses(&refreshed).await;

        refreshed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(refreshed)
    }

    /// One container with its status refreshed. `NotFound` only when absent.
    pub async fn get_container(&self, id: &str) -> Result<Container, ControlError> {
        let cached = self
            .containers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ControlError::not_found("container", id))?;

        let container = self.refresh(cached).await?;
        self.store_statuses(std::slice::from_ref(&container)).await;
        Ok(container)
    }

    async fn refresh(&self, mut container: Container) -> Result<Container, ControlError> {
        let server = self.fleet.servers.get(&container.server_id).await?;
        let sandbox = self
            .fleet
            .agent
            .get_sandbox(&server.ip, &container.sandbox_id)
            .await?;

        if sandbox.status != container.status {
            tracing::debug!(
                container_id = %container.id,
                from = %container.status,
                to = %sandbox.status,
                "container status changed"
            );
        }
        container.status = sandbox.status;
        Ok(container)
    }

    async fn store_statuses(&self, refreshed: &[Container]) {
        let mut containers = self.containers.write().await;
        for fresh in refreshed {
            if let Some(cached) = containers.get_mut(&fresh.id) {
                cached.status.clone_from(&fresh.status);
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the service, drop every container and release its placement.
    /// Sandboxes keep running. Creates still in flight fail with `NotFound`.
    pub(crate) async fn discard_containers(&self) -> usize {
        let drained: Vec<Container> = {
            let mut containers = self.containers.write().await;
            self.closed.store(true, Ordering::Release);
            containers.drain().map(|(_, c)| c).collect()
        };
        for container in &drained {
            self.fleet.servers.release_placement(&container.server_id).await;
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::placement::PlacementKind;
    use crate::testing::{FakeAdapter, FakeAgent, fleet};

    async fn service(adapter: Arc<FakeAdapter>, agent: Arc<FakeAgent>) -> Service {
        let fleet = fleet(adapter, agent, PlacementKind::LeastLoaded).await;
        Service::new("a1b2c3".into(), "web".into(), fleet)
    }

    #[tokio::test]
    async fn debug_shows_identity_only() {
        let svc = service(Arc::new(FakeAdapter::empty()), Arc::new(FakeAgent::new())).await;
        let shown = format!("{svc:?}");
        assert!(shown.starts_with(r#"Service { id: "a1b2c3", name: "web""#), "{shown}");
        assert!(!shown.contains("fleet"), "{shown}");
    }

    #[tokio::test]
    async fn empty_registry_provisions_exactly_one_server() {
        let adapter = Arc::new(FakeAdapter::empty());
        let agent = Arc::new(FakeAgent::new());
        let svc = service(adapter.clone(), agent.clone()).await;

        let container = svc.create_container("nginx", None).await.unwrap();
        assert_eq!(adapter.created(), 1);
        let servers = svc.fleet.servers.list().await;
        assert_eq!(servers.len(), 1);
        assert_eq!(container.server_id, servers[0].id);
        assert!(servers[0].name.starts_with(SERVER_NAME_PREFIX));

        svc.create_container("nginx", None).await.unwrap();
        assert_eq!(adapter.created(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_containers_share_one_new_server() {
        let adapter = Arc::new(FakeAdapter::empty());
        let agent = Arc::new(FakeAgent::new());
        let svc = Arc::new(service(adapter.clone(), agent.clone()).await);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..6 {
            let svc = svc.clone();
            tasks.spawn(async move { svc.create_container("nginx", None).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }
        assert_eq!(adapter.created(), 1);
        assert_eq!(svc.record().await.containers.len(), 6);
    }

    #[tokio::test]
    async fn container_fields_come_from_sandbox() {
        let adapter = Arc::new(FakeAdapter::with_servers(&["node"]));
        let agent = Arc::new(FakeAgent::new());
        let svc = service(adapter.clone(), agent.clone()).await;

        let container = svc
            .create_container("python:3.12", Some("python -m http.server".into()))
            .await
            .unwrap();
        assert_eq!(adapter.created(), 0);
        assert_eq!(container.service_id, "a1b2c3");
        assert_eq!(container.sandbox_id, "sbx-1");
        assert_eq!(container.host, "http://10.0.0.1:30001");
        assert_eq!(container.status, "starting");
        assert_eq!(container.image_name, "python:3.12");
        assert_eq!(container.start_command.as_deref(), Some("python -m http.server"));
        assert_eq!(container.id.len(), 6);

        let calls = agent.create_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "10.0.0.1");
        assert_eq!(calls[0].1.start_command.as_deref(), Some("python -m http.server"));
    }

    #[tokio::test]
    async fn blank_start_command_is_dropped_and_blank_image_rejected() {
        let agent = Arc::new(FakeAgent::new());
        let svc = service(Arc::new(FakeAdapter::with_servers(&["node"])), agent.clone()).await;

        let container = svc.create_container("nginx", Some("  ".into())).await.unwrap();
        assert!(container.start_command.is_none());

        let err = svc.create_container("   ", None).await.unwrap_err();
        assert!(matches!(err, ControlError::InvalidInput(_)));
        assert_eq!(agent.create_calls().len(), 1);
    }

    #[tokio::test]
    async fn agent_failure_leaves_service_untouched() {
        let agent = Arc::new(FakeAgent::new());
        agent.fail_creates(true);
        let svc = service(Arc::new(FakeAdapter::with_servers(&["node"])), agent.clone()).await;

        let err = svc.create_container("nginx", None).await.unwrap_err();
        assert!(matches!(err, ControlError::Agent(_)));
        assert!(svc.record().await.containers.is_empty());
        assert!(svc.fleet.servers.load().await.is_empty());
    }

    #[tokio::test]
    async fn provisioning_failure_propagates() {
        let adapter = Arc::new(FakeAdapter::empty());
        adapter.fail_creates(true);
        let agent = Arc::new(FakeAgent::new());
        let svc = service(adapter, agent.clone()).await;

        let err = svc.create_container("nginx", None).await.unwrap_err();
        assert!(matches!(err, ControlError::Backend(_)));
        assert!(agent.create_calls().is_empty());
        assert!(svc.record().await.containers.is_empty());
    }

    #[tokio::test]
    async fn least_loaded_spreads_containers() {
        let svc = service(
            Arc::new(FakeAdapter::with_servers(&["a", "b"])),
            Arc::new(FakeAgent::new()),
        )
        .await;

        let first = svc.create_container("nginx", None).await.unwrap();
        let second = svc.create_container("nginx", None).await.unwrap();
        assert_ne!(first.server_id, second.server_id);

        let load = svc.fleet.servers.load().await;
        assert_eq!(load.values().copied().collect::<Vec<_>>(), vec![1, 1]);
    }

    #[tokio::test]
    async fn list_reflects_latest_agent_status() {
        let agent = Arc::new(FakeAgent::new());
        let svc = service(Arc::new(FakeAdapter::with_servers(&["node"])), agent.clone()).await;

        let a = svc.create_container("nginx", None).await.unwrap();
        let b = svc.create_container("redis", None).await.unwrap();
        agent.set_status(&a.sandbox_id, "running");
        agent.set_status(&b.sandbox_id, "exited");

        let listed = svc.list_containers().await.unwrap();
        assert_eq!(listed.len(), 2);
        let status_of = |id: &str| {
            listed
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.status.clone())
                .unwrap()
        };
        assert_eq!(status_of(&a.id), "running");
        assert_eq!(status_of(&b.id), "exited");
        assert!(listed.windows(2).all(|w| w[0].id < w[1].id));

        let cached = svc.record().await;
        assert_eq!(cached.containers[&a.id].status, "running");
    }

    #[tokio::test]
    async fn list_is_all_or_nothing() {
        let agent = Arc::new(FakeAgent::new());
        let svc = service(Arc::new(FakeAdapter::with_servers(&["node"])), agent.clone()).await;
        let a = svc.create_container("nginx", None).await.unwrap();
        svc.create_container("redis", None).await.unwrap();

        agent.set_status(&a.sandbox_id, "running");
        agent.forget(&a.sandbox_id);

        let err = svc.list_containers().await.unwrap_err();
        assert!(matches!(err, ControlError::Agent(_)));
        assert!(svc.record().await.containers.values().all(|c| c.status == "starting"));
    }

    #[tokio::test]
    async fn list_fails_when_server_was_removed() {
        let svc = service(
            Arc::new(FakeAdapter::with_servers(&["node"])),
            Arc::new(FakeAgent::new()),
        )
        .await;
        let container = svc.create_container("nginx", None).await.unwrap();
        svc.fleet.servers.delete(&container.server_id).await.unwrap();

        let err = svc.list_containers().await.unwrap_err();
        assert!(matches!(err, ControlError::NotFound { kind: "server", .. }));
    }

    // Regression guard: a found container must be refreshed and returned,
    // never reported as missing.
    #[tokio::test]
    async fn get_container_returns_found_and_rejects_absent() {
        let agent = Arc::new(FakeAgent::new());
        let svc = service(Arc::new(FakeAdapter::with_servers(&["node"])), agent.clone()).await;
        let created = svc.create_container("nginx", None).await.unwrap();
        agent.set_status(&created.sandbox_id, "running");

        let got = svc.get_container(&created.id).await.unwrap();
        assert_eq!(got.id, created.id);
        assert_eq!(got.status, "running");
        assert_eq!(svc.record().await.containers[&created.id].status, "running");

        let err = svc.get_container("ffffff").await.unwrap_err();
        assert!(matches!(err, ControlError::NotFound { kind: "container", .. }));
    }

    #[tokio::test]
    async fn discard_releases_placements() {
        let svc = service(
            Arc::new(FakeAdapter::with_servers(&["node"])),
            Arc::new(FakeAgent::new()),
        )
        .await;
        svc.create_container("nginx", None).await.unwrap();
        svc.create_container("nginx", None).await.unwrap();

        assert_eq!(svc.discard_containers().await, 2);
        assert!(svc.record().await.containers.is_empty());
        assert!(svc.fleet.servers.load().await.is_empty());
    }
}
