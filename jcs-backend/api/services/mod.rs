pub mod handlers;

use axum::Router;
use axum::routing::get;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/services",
            get(handlers::list_services).post(handlers::create_service),
        )
        .route(
            "/services/{id}",
            get(handlers::get_service).delete(handlers::delete_service),
        )
        .route(
            "/services/{id}/containers",
            get(handlers::list_containers).post(handlers::create_container),
        )
        .route(
            "/services/{id}/containers/{container_id}",
            get(handlers::get_container),
        )
}
