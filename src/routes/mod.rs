pub mod error;
pub mod gallery;
pub mod generate;
pub mod health;
pub mod metrics;
pub mod progress;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Room for the multipart framing and text fields around the two photos.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the HTTP router. `/metrics` is mounted only when a recorder is installed.
pub fn router(
    state: AppState,
    prometheus: Option<Arc<PrometheusHandle>>,
    max_upload_bytes: usize,
) -> Router {
    let body_limit = max_upload_bytes * 2 + FORM_OVERHEAD_BYTES;

    let mut app = Router::new()
        // Static UI (embedded at compile time)
        .route("/", get(|| async { Html(include_str!("../../static/index.html")) }))
        .route("/health", get(health::health_check))
        .route("/generate", post(generate::generate))
        .route("/api/generate", post(generate::generate))
        .route("/check_progress", get(progress::check_progress))
        .route("/api/check_progress", get(progress::check_progress))
        .route("/reset_on_upload", post(generate::reset_on_upload))
        .route("/api/gallery", post(gallery::save_to_gallery))
        .route("/api/gallery/{public_id}", get(gallery::get_gallery_item))
        .with_state(state);

    if let Some(handle) = prometheus {
        app = app.route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(handle),
        );
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
}
