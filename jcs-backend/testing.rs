//! In-process fakes for the compute backend and the host agent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::agent::{AgentError, Sandbox, SandboxAgent, SandboxCreateRequest};
use crate::compute::{
    BackendError, BackendKind, ProvisionDefaults, ProvisionRequest, RemoteServer, ServerAdapter,
};
use crate::servers::ServerRegistry;
use crate::services::Fleet;
use crate::services::placement::{PlacementKind, build_strategy};

/// Backend whose instances live in memory. Creates take a few milliseconds
/// so concurrent callers actually overlap.
#[derive(Default)]
pub struct FakeAdapter {
    remotes: Vec<RemoteServer>,
    fail_list: bool,
    fail_create: AtomicBool,
    created: AtomicUsize,
    last_request: Mutex<Option<ProvisionRequest>>,
}

impl FakeAdapter {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Instances with the given native ids at `10.0.0.1`, `10.0.0.2`, ...
    pub fn with_servers(ids: &[&str]) -> Self {
        let remotes = ids
            .iter()
            .enumerate()
            .map(|(i, id)| RemoteServer {
                id: id.to_string(),
                name: format!("{id}-{i}"),
                kind: BackendKind::Local,
                status: "running".into(),
                ip: format!("10.0.0.{}", i + 1),
            })
            .collect();
        Self {
            remotes,
            ..Self::default()
        }
    }

    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Self::default()
        }
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProvisionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerAdapter for FakeAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn list_servers(&self) -> Result<Vec<RemoteServer>, BackendError> {
        if self.fail_list {
            return Err(BackendError::Transport("fake list failure".into()));
        }
        Ok(self.remotes.clone())
    }

    async fn get_server(&self, id: &str) -> Result<RemoteServer, BackendError> {
        self.remotes
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn create_server(&self, req: &ProvisionRequest) -> Result<RemoteServer, BackendError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        *self.last_request.lock().unwrap() = Some(req.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                body: "fake create failure".into(),
            });
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RemoteServer {
            id: format!("fake{n}"),
            name: req.name.clone(),
            kind: BackendKind::Local,
            status: "running".into(),
            ip: format!("10.0.1.{n}"),
        })
    }
}

/// Host agent keeping sandboxes in a map. Sandbox `n` gets id `sbx-n`,
/// status `starting` and preview URL `http://<host>:<30000 + n>`.
#[derive(Default)]
pub struct FakeAgent {
    sandboxes: Mutex<HashMap<String, Sandbox>>,
    next: AtomicUsize,
    fail_create: AtomicBool,
    creates: Mutex<Vec<(String, SandboxCreateRequest)>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, sandbox_id: &str, status: &str) {
        if let Some(sandbox) = self.sandboxes.lock().unwrap().get_mut(sandbox_id) {
            sandbox.status = status.to_string();
        }
    }

    /// Make the agent lose a sandbox, as after a host reboot.
    pub fn forget(&self, sandbox_id: &str) {
        self.sandboxes.lock().unwrap().remove(sandbox_id);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Park every later create call until the returned gate is notified
    /// (one `notify_one` releases one call).
    pub fn hold_creates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// `(host, request)` for every create call that reached the agent.
    pub fn create_calls(&self) -> Vec<(String, SandboxCreateRequest)> {
        self.creates.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxAgent for FakeAgent {
    async fn create_sandbox(
        &self,
        host: &str,
        req: &SandboxCreateRequest,
    ) -> Result<Sandbox, AgentError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AgentError::Transport {
                url: format!("http://{host}/api/sandboxes"),
                reason: "connection refused".into(),
            });
        }
        self.creates
            .lock()
            .unwrap()
            .push((host.to_string(), req.clone()));

        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        let sandbox = Sandbox {
            id: format!("sbx-{n}"),
            status: "starting".into(),
            preview_url: format!("http://{host}:{}", 30000 + n),
            websocket_url: format!("ws://{host}:{}/ws", 30000 + n),
        };
        self.sandboxes
            .lock()
            .unwrap()
            .insert(sandbox.id.clone(), sandbox.clone());
        Ok(sandbox)
    }

    async fn get_sandbox(&self, _host: &str, sandbox_id: &str) -> Result<Sandbox, AgentError> {
        self.sandboxes
            .lock()
            .unwrap()
            .get(sandbox_id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(sandbox_id.to_string()))
    }
}

/// A fleet over the fakes with the server registry already initialized.
pub async fn fleet(
    adapter: Arc<FakeAdapter>,
    agent: Arc<FakeAgent>,
    placement: PlacementKind,
) -> Arc<Fleet> {
    let servers = Arc::new(ServerRegistry::new(adapter, ProvisionDefaults::default()));
    servers.initialize().await;
    Arc::new(Fleet {
        servers,
        agent,
        placement: build_strategy(placement),
    })
}
