/// Errors from calls to a server's sandbox agent.
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("sandbox not found: {0}")]
    NotFound(String),

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("agent returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("serialization: {0}")]
    Serde(String),

    #[error("timeout calling {0}")]
    Timeout(String),
}

impl AgentError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Timeout(url.to_string())
        } else if err.is_decode() {
            AgentError::Serde(format!("failed to parse sandbox from {url}: {err}"))
        } else {
            AgentError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
