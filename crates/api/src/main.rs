use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use tabfuse_api::app::{self, AppState};
use tabfuse_api::config::Config;
use tabfuse_api::jobs::{spawn_retention_sweeper, JobTracker, WorkerPool};
use tabfuse_api::middleware;
use tabfuse_api::services::enrichment::EnrichmentEngine;
use tabfuse_api::services::external_api::ExternalFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging and metrics
    middleware::logging::init_logging(&config.logging);
    middleware::metrics::init_metrics();

    info!("Starting Tabfuse API v{}", env!("CARGO_PKG_VERSION"));

    // Ensure the file store exists before anything touches it
    tokio::fs::create_dir_all(&config.storage.data_dir).await?;

    // Create database pool
    let pool = persistence::db::create_pool(&persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    })
    .await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    // Wire up the enrichment pipeline
    let config = Arc::new(config);
    let tracker = Arc::new(JobTracker::new());
    let fetcher = ExternalFetcher::new(Duration::from_secs(
        config.enrichment.fetch_timeout_secs,
    ))?;
    let engine = Arc::new(EnrichmentEngine::new(
        pool.clone(),
        Arc::clone(&tracker),
        fetcher,
        config.storage.data_dir.clone(),
        config.enrichment.chunk_size,
    ));
    let worker_pool = WorkerPool::start(
        engine,
        config.enrichment.worker_count,
        config.enrichment.queue_capacity,
    );
    let sweeper = spawn_retention_sweeper(
        Arc::clone(&tracker),
        config.enrichment.sweep_interval_secs,
        config.enrichment.job_retention_secs,
        worker_pool.subscribe_shutdown(),
    );

    // Build application
    let state = AppState {
        pool,
        config: Arc::clone(&config),
        tracker,
        jobs: worker_pool.submitter(),
    };
    let app = app::create_app(state);

    // Start server
    let addr = config.socket_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain background work before exiting
    worker_pool.shutdown();
    worker_pool.wait_for_shutdown(Duration::from_secs(30)).await;
    let _ = sweeper.await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    info!("Shutdown signal received");
}
