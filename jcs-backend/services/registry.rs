use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::service::{Fleet, Service};
use crate::error::ControlError;
use crate::ids::unique_id;

/// Authoritative set of services, keyed by id.
///
/// Name check, id generation and insert happen under one write lock, so
/// concurrent creators can neither share a name nor an id.
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<Service>>>,
    fleet: Arc<Fleet>,
}

impl ServiceRegistry {
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            fleet,
        }
    }

    pub async fn create(&self, name: &str) -> Result<Arc<Service>, ControlError> {
        if name.trim().is_empty() {
            return Err(ControlError::InvalidInput("name must not be empty".into()));
        }

        let mut services = self.services.write().await;
        if services.values().any(|s| s.name() == name) {
            return Err(ControlError::conflict("service", name));
        }

        let id = unique_id("service", "", |candidate| services.contains_key(candidate))?;
        let service = Arc::new(Service::new(id.clone(), name.to_string(), self.fleet.clone()));
        services.insert(id, service.clone());

        tracing::info!(service_id = %service.id(), name = %name, "service created");
        Ok(service)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<Service>, ControlError> {
        self.services
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ControlError::not_found("service", id))
    }

    /// All services, ordered by name.
    pub async fn list(&self) -> Vec<Arc<Service>> {
        let mut services: Vec<Arc<Service>> = self.services.read().await.values().cloned().collect();
        services.sort_by(|a, b| a.name().cmp(b.name()));
        services
    }

    /// Remove a service and forget its containers. Their sandboxes keep running.
    pub async fn delete(&self, id: &str) -> Result<(), ControlError> {
        let removed = self.services.write().await.remove(id);
        let Some(service) = removed else {
            return Err(ControlError::not_found("service", id));
        };

        let discarded = service.discard_containers().await;
        tracing::info!(
            service_id = %id,
            name = %service.name(),
            containers = discarded,
            "service deleted (sandboxes not torn down)"
        );
        Ok(())
    }
}
