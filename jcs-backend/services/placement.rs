//! Server selection for new containers.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::servers::Server;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlacementKind {
    #[default]
    LeastLoaded,
    RoundRobin,
    First,
}

impl PlacementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeastLoaded => "least-loaded",
            Self::RoundRobin => "round-robin",
            Self::First => "first",
        }
    }
}

impl FromStr for PlacementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "least-loaded" | "least_loaded" => Ok(Self::LeastLoaded),
            "round-robin" | "round_robin" => Ok(Self::RoundRobin),
            "first" => Ok(Self::First),
            other => Err(other.to_string()),
        }
    }
}

/// Picks the server a new container lands on.
///
/// `servers` is non-empty and ordered by id; `load` maps server id to its
/// live container count (missing means zero).
pub trait PlacementStrategy: Send + Sync {
    fn kind(&self) -> PlacementKind;

    fn select<'a>(
        &self,
        servers: &'a [Server],
        load: &HashMap<String, usize>,
    ) -> Option<&'a Server>;
}

/// Fewest live containers wins; ties go to the lowest id.
pub struct LeastLoaded;

impl PlacementStrategy for LeastLoaded {
    fn kind(&self) -> PlacementKind {
        PlacementKind::LeastLoaded
    }

    fn select<'a>(
        &self,
        servers: &'a [Server],
        load: &HashMap<String, usize>,
    ) -> Option<&'a Server> {
        servers
            .iter()
            .min_by_key(|s| load.get(&s.id).copied().unwrap_or(0))
    }
}

#[derive(Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl PlacementStrategy for RoundRobin {
    fn kind(&self) -> PlacementKind {
        PlacementKind::RoundRobin
    }

    fn select<'a>(
        &self,
        servers: &'a [Server],
        _load: &HashMap<String, usize>,
    ) -> Option<&'a Server> {
        if servers.is_empty() {
            return None;
        }
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        servers.get(n % servers.len())
    }
}

/// Always the first server. Ignores capacity entirely.
pub struct FirstServer;

impl PlacementStrategy for FirstServer {
    fn kind(&self) -> PlacementKind {
        PlacementKind::First
    }

    fn select<'a>(
        &self,
        servers: &'a [Server],
        _load: &HashMap<String, usize>,
    ) -> Option<&'a Server> {
        servers.first()
    }
}

pub fn build_strategy(kind: PlacementKind) -> Arc<dyn PlacementStrategy> {
    tracing::info!(strategy = kind.as_str(), "using placement strategy");
    match kind {
        PlacementKind::LeastLoaded => Arc::new(LeastLoaded),
        PlacementKind::RoundRobin => Arc::new(RoundRobin::default()),
        PlacementKind::First => Arc::new(FirstServer),
    }
}
