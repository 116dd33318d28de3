pub mod adapter;
pub mod backends;
pub mod error;
pub mod hetzner;
pub mod types;

use std::sync::Arc;

pub use adapter::ServerAdapter;
pub use error::BackendError;
pub use types::*;

use backends::hetzner::HetznerServerAdapter;
use backends::local::LocalServerAdapter;
use hetzner::HetznerClient;

/// Build the active compute backend from runtime config.
pub fn build_adapter(
    config: &ComputeConfig,
    http_client: reqwest::Client,
    max_in_flight: usize,
) -> Arc<dyn ServerAdapter> {
    match config {
        ComputeConfig::Local => {
            tracing::info!("initializing local compute backend");
            Arc::new(LocalServerAdapter)
        }
        ComputeConfig::Hetzner(c) => {
            if c.api_key.as_deref().is_none_or(str::is_empty) {
                tracing::warn!("HETZNER_API_KEY is not set, every Hetzner call will fail");
            }
            tracing::info!(api_url = %c.api_base_url, "initializing Hetzner compute backend");
            let client = HetznerClient::new(
                http_client,
                c.api_base_url.clone(),
                c.api_key.clone(),
                max_in_flight,
            );
            Arc::new(HetznerServerAdapter::new(client))
        }
    }
}
