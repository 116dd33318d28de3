use axum::{
    body::Body,
    http::{Request, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::Span;

pub async fn enrich_current_span_middleware(req: Request<Body>, next: Next) -> Response {
    let uri: &Uri = req.uri();

    let host = req
        .headers()
        .get("host")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("UNKNOWN");

    let current_span = Span::current();

    current_span.record("http.uri", uri.path());
    current_span.record("http.host", host);
    if let Some(query) = uri.query() {
        current_span.record("http.query", query);
    }

    next.run(req).await
}

/// `/api/services/` redirects (308) to `/api/services`, query preserved.
///
/// Leading slashes collapse to one so the `Location` is always a path on
/// this host, never a protocol-relative `//host` URL.
pub async fn strip_trailing_slash(req: Request<Body>, next: Next) -> Response {
    let uri = req.uri();

    match uri.path().strip_suffix('/') {
        Some(path) if !path.trim_start_matches('/').is_empty() => {
            let path = format!("/{}", path.trim_start_matches('/'));
            let target = match uri.query() {
                Some(query) => format!("{path}?{query}"),
                None => path,
            };
            Redirect::permanent(&target).into_response()
        }
        _ => next.run(req).await,
    }
}
