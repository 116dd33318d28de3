/// Errors from compute backend operations.
///
/// Adapters map their transport and decode failures into these variants.
/// A failed call is never reported as `NotFound`; that variant means the
/// backend answered and the instance does not exist.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("server not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("serialization: {0}")]
    Serde(String),

    #[error("timeout")]
    Timeout,
}

impl BackendError {
    pub(crate) fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Serde(format!("{context}: {err}"))
        } else {
            BackendError::Transport(format!("{context}: {err}"))
        }
    }
}
