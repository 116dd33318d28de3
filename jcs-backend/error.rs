use crate::agent::AgentError;
use crate::compute::BackendError;

/// Errors returned by registry and service operations.
#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    #[error("{kind} not found with ID '{id}'")]
    NotFound { kind: &'static str, id: String },

    #[error("a {kind} already exists with the name '{name}'")]
    Conflict { kind: &'static str, name: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("compute backend: {0}")]
    Backend(#[from] BackendError),

    #[error("sandbox agent: {0}")]
    Agent(#[from] AgentError),

    #[error("could not generate a unique {0} id")]
    IdExhausted(&'static str),

    #[error("random source unavailable: {0}")]
    Entropy(String),
}

impl ControlError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn conflict(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
        }
    }
}
