use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::actions::form_action;
use super::admin::admin_router;
use super::api::api_router;
use super::simple;
use crate::registry::Registry;
use crate::upstream::UpstreamClient;

/// Uploads larger than this are rejected before reaching a handler.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub struct AppState {
    pub registry: Arc<Registry>,
    /// Consulted when a simple listing misses locally.
    pub upstream: Option<UpstreamClient>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, upstream: Option<UpstreamClient>) -> Self {
        Self { registry, upstream }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/",
            post(form_action).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/simple", get(simple::redirect_simple_root))
        .route("/simple/", get(simple::simple_root))
        .route("/simple/{distro}", get(simple::redirect_simple_distro))
        .route("/simple/{distro}/", get(simple::simple_distro))
        .route("/d/{id}/f/{filename}", get(simple::download_file))
        .route("/d/{id}/i/{index}", get(simple::redirect_custom_index))
        .route("/d/{id}/i/{index}/", get(simple::custom_index))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
