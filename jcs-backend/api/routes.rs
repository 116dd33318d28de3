use axum::body::Body;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use hyper::StatusCode;
use hyper::header;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

use super::AppState;
use super::middleware;

pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route(
        "/",
        get(|| async {
            Json(json!({
                "status": "ok",
            }))
        }),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION]);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %req.method(),
            http.uri = Empty,
            http.host = Empty,
            http.query = Empty,
        )
    });

    Router::new()
        .nest("/health", health_routes)
        .nest("/api", api_router())
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::strip_trailing_slash))
        .layer(axum::middleware::from_fn(
            middleware::enrich_current_span_middleware,
        ))
        .layer(trace)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .merge(super::services::router())
        .merge(super::servers::router())
}

async fn not_found(req: axum::extract::Request) -> impl IntoResponse {
    tracing::warn!("unhandled path: {}", req.uri());
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
