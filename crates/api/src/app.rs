use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::jobs::{JobSubmitter, JobTracker};
use crate::middleware::{metrics_handler, metrics_middleware};
use crate::routes::{enrichment, files, health};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub tracker: Arc<JobTracker>,
    pub jobs: JobSubmitter,
}

pub fn create_app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // File and enrichment routes (v1)
    let api_routes = Router::new()
        .route("/api/v1/files", post(files::upload_file).get(files::list_files))
        .route(
            "/api/v1/files/:file_id",
            get(files::get_file).delete(files::delete_file),
        )
        .route("/api/v1/files/:file_id/preview", get(files::preview_file))
        .route("/api/v1/files/:file_id/download", get(files::download_file))
        .route(
            "/api/v1/files/:file_id/enrich",
            post(enrichment::submit_enrichment),
        )
        .route("/api/v1/jobs/:job_id", get(enrichment::job_status))
        // Multipart framing overhead on top of the raw file bytes
        .layer(DefaultBodyLimit::max(
            config.storage.max_upload_bytes + 64 * 1024,
        ));

    // Public routes (probes and metrics)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
