pub mod middleware;
mod routes;
pub mod servers;
pub mod services;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{Json, Router};
use hyper::StatusCode;
use serde_json::{Value, json};

use crate::compute::BackendError;
use crate::error::ControlError;
use crate::servers::ServerRegistry;
use crate::services::ServiceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub servers: Arc<ServerRegistry>,
    pub services: Arc<ServiceRegistry>,
}

pub fn create_app(state: AppState) -> Router {
    routes::build_router(state)
}

/// Status plus `{"error": "..."}` body.
pub(crate) type ApiError = (StatusCode, Json<Value>);

pub(crate) type ApiResult<T> = Result<T, ApiError>;

fn status_for(err: &ControlError) -> StatusCode {
    match err {
        ControlError::NotFound { .. } => StatusCode::NOT_FOUND,
        ControlError::Conflict { .. } => StatusCode::CONFLICT,
        ControlError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ControlError::Backend(BackendError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        ControlError::Backend(_) | ControlError::Agent(_) => StatusCode::BAD_GATEWAY,
        ControlError::IdExhausted(_) | ControlError::Entropy(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ControlError> for (StatusCode, Json<Value>) {
    fn from(err: ControlError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %err, "request failed");
        }
        (status, Json(json!({ "error": err.to_string() })))
    }
}

/// Malformed or incomplete JSON bodies are a 400, whatever axum's default.
pub(crate) fn bad_body(rejection: JsonRejection) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": rejection.body_text() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;

    #[test]
    fn test_control_error_status_mapping() {
        let cases = [
            (ControlError::not_found("service", "abc123"), StatusCode::NOT_FOUND),
            (ControlError::conflict("service", "web"), StatusCode::CONFLICT),
            (ControlError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                BackendError::Configuration("no key".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                BackendError::Status { status: 503, body: String::new() }.into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AgentError::Timeout("http://10.0.0.1/api/sandboxes".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (ControlError::IdExhausted("container"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_error_body_shape() {
        let (status, Json(body)): ApiError = ControlError::not_found("server", "ff00aa").into();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "server not found with ID 'ff00aa'" }));
    }
}
