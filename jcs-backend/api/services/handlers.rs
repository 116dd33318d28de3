use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use hyper::StatusCode;
use serde::Deserialize;

use crate::api::{ApiResult, AppState, bad_body};
use crate::services::{Container, ServiceRecord};

pub(crate) async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceRecord>> {
    let services = state.services.list().await;
    let mut records = Vec::with_capacity(services.len());
    for service in services {
        records.push(service.record().await);
    }
    Json(records)
}

#[derive(Deserialize)]
pub(crate) struct CreateServiceRequest {
    name: String,
}

pub(crate) async fn create_service(
    State(state): State<AppState>,
    body: Result<Json<CreateServiceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ServiceRecord>)> {
    let Json(body) = body.map_err(bad_body)?;
    let service = state.services.create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(service.record().await)))
}

pub(crate) async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ServiceRecord>> {
    let service = state.services.get(&id).await?;
    Ok(Json(service.record().await))
}

pub(crate) async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/services/{id}/containers: statuses refreshed from each agent.
pub(crate) async fn list_containers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Container>>> {
    let service = state.services.get(&id).await?;
    Ok(Json(service.list_containers().await?))
}

#[derive(Deserialize)]
pub(crate) struct CreateContainerRequest {
    image_name: String,
    #[serde(default)]
    start_command: Option<String>,
}

pub(crate) async fn create_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CreateContainerRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Container>)> {
    let Json(body) = body.map_err(bad_body)?;
    let service = state.services.get(&id).await?;
    let container = service
        .create_container(&body.image_name, body.start_command)
        .await?;
    Ok((StatusCode::CREATED, Json(container)))
}

pub(crate) async fn get_container(
    State(state): State<AppState>,
    Path((id, container_id)): Path<(String, String)>,
) -> ApiResult<Json<Container>> {
    let service = state.services.get(&id).await?;
    Ok(Json(service.get_container(&container_id).await?))
}
