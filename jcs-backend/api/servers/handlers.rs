use axum::Json;
use axum::extract::{Path, State};
use hyper::StatusCode;

use crate::api::{ApiResult, AppState};
use crate::servers::Server;

pub(crate) async fn list_servers(State(state): State<AppState>) -> Json<Vec<Server>> {
    Json(state.servers.list().await)
}

pub(crate) async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Server>> {
    Ok(Json(state.servers.get(&id).await?))
}

/// DELETE /api/servers/{id}: forgets the server; the instance is not destroyed.
pub(crate) async fn delete_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.servers.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
