pub mod handlers;

use axum::Router;
use axum::routing::get;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/servers", get(handlers::list_servers))
        .route(
            "/servers/{id}",
            get(handlers::get_server).delete(handlers::delete_server),
        )
}
