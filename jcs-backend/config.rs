use std::time::Duration;

use crate::agent::AgentConfig;
use crate::compute::{ComputeConfig, HETZNER_API_URL, HetznerConfig, ProvisionDefaults};
use crate::http::RemoteCallConfig;
use crate::services::placement::PlacementKind;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown COMPUTE_BACKEND '{0}' (expected 'local' or 'hetzner')")]
    UnknownBackend(String),

    #[error("unknown PLACEMENT_STRATEGY: {0}")]
    UnknownPlacement(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sentry_dsn: Option<String>,
    pub environment: String,
    pub compute: ComputeConfig,
    pub provision: ProvisionDefaults,
    pub agent: AgentConfig,
    pub remote: RemoteCallConfig,
    pub placement: PlacementKind,
}

/// Unparsed values, one per environment variable.
#[derive(Debug, Default)]
pub struct RawConfig {
    pub port: Option<String>,
    pub sentry_dsn: Option<String>,
    pub environment: Option<String>,
    pub compute_backend: Option<String>,
    pub hetzner_api_key: Option<String>,
    pub hetzner_api_url: Option<String>,
    pub server_type: Option<String>,
    pub image: Option<String>,
    pub agent_port: Option<String>,
    pub agent_base_path: Option<String>,
    pub remote_timeout_secs: Option<String>,
    pub remote_connect_timeout_secs: Option<String>,
    pub max_remote_calls: Option<String>,
    pub placement_strategy: Option<String>,
}

impl RawConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            port: var("PORT"),
            sentry_dsn: var("SENTRY_DSN"),
            environment: var("ENVIRONMENT"),
            compute_backend: var("COMPUTE_BACKEND"),
            hetzner_api_key: var("HETZNER_API_KEY"),
            hetzner_api_url: var("HETZNER_API_URL"),
            server_type: var("HETZNER_SERVER_TYPE"),
            image: var("HETZNER_IMAGE"),
            agent_port: var("AGENT_PORT"),
            agent_base_path: var("AGENT_BASE_PATH"),
            remote_timeout_secs: var("REMOTE_TIMEOUT_SECS"),
            remote_connect_timeout_secs: var("REMOTE_CONNECT_TIMEOUT_SECS"),
            max_remote_calls: var("MAX_REMOTE_CALLS"),
            placement_strategy: var("PLACEMENT_STRATEGY"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    non_empty(value)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Seconds; zero or unparseable means `default`.
fn secs_or(value: Option<String>, default: Duration) -> Duration {
    match parse_or(value, default.as_secs()) {
        0 => default,
        secs => Duration::from_secs(secs),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_raw_values(RawConfig::from_env())
    }

    /// Build a Config from raw string values (as they would come from env vars).
    /// Used directly in tests to avoid mutating process-global environment.
    pub fn from_raw_values(raw: RawConfig) -> Result<Self, ConfigError> {
        let backend = non_empty(raw.compute_backend).map(|b| b.to_ascii_lowercase());
        let compute = match backend.as_deref() {
            None | Some("local") => ComputeConfig::Local,
            Some("hetzner") => ComputeConfig::Hetzner(HetznerConfig {
                api_base_url: non_empty(raw.hetzner_api_url)
                    .unwrap_or_else(|| HETZNER_API_URL.to_string()),
                api_key: non_empty(raw.hetzner_api_key),
            }),
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let placement = match non_empty(raw.placement_strategy) {
            None => PlacementKind::default(),
            Some(name) => name
                .parse::<PlacementKind>()
                .map_err(ConfigError::UnknownPlacement)?,
        };

        let defaults = ProvisionDefaults::default();
        let provision = ProvisionDefaults {
            server_type: non_empty(raw.server_type).unwrap_or(defaults.server_type),
            image: non_empty(raw.image).unwrap_or(defaults.image),
        };

        let agent = AgentConfig {
            port: non_empty(raw.agent_port).and_then(|v| v.parse().ok()),
            base_path: non_empty(raw.agent_base_path).unwrap_or_else(|| AgentConfig::default().base_path),
        };

        let remote_defaults = RemoteCallConfig::default();
        let remote = RemoteCallConfig {
            timeout: secs_or(raw.remote_timeout_secs, remote_defaults.timeout),
            connect_timeout: secs_or(
                raw.remote_connect_timeout_secs,
                remote_defaults.connect_timeout,
            ),
            max_in_flight: parse_or(raw.max_remote_calls, remote_defaults.max_in_flight).max(1),
        };

        Ok(Config {
            port: parse_or(raw.port, 8002),
            sentry_dsn: non_empty(raw.sentry_dsn),
            environment: non_empty(raw.environment).unwrap_or_else(|| "local".to_string()),
            compute,
            provision,
            agent,
            remote,
            placement,
        })
    }
}
