use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use photo_strip_gen::app_state::AppState;
use photo_strip_gen::config::AppConfig;
use photo_strip_gen::db;
use photo_strip_gen::routes;
use photo_strip_gen::services::{assets::AssetLoader, gallery::GalleryStore, job_store};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing photo-strip-gen server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    // Brand assets are attached to every request, so refuse to start without them
    AssetLoader::new(&config.asset_dir)
        .check()
        .await
        .expect("Brand assets are missing");

    // Gallery is optional and only enabled with a database
    let gallery = match config.database() {
        Some(database_url) => {
            tracing::info!("Connecting to PostgreSQL database");
            let db_pool = db::init_pool(database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&db_pool)
                .await
                .expect("Failed to run database migrations");

            Some(GalleryStore::new(
                db_pool,
                config.gallery_ttl_hours,
                config.public_base_url.clone(),
            ))
        }
        None => {
            tracing::info!("DATABASE_URL not set, gallery disabled");
            None
        }
    };

    let state =
        AppState::from_config(&config, gallery).expect("Failed to initialize HTTP client");

    tracing::info!(
        providers = ?state.orchestrator.provider_names(),
        "Image providers configured"
    );

    // Background cleanup of expired jobs and gallery rows
    job_store::spawn_sweeper(state.jobs.clone(), config.sweep_interval());
    if let Some(gallery) = state.gallery.clone() {
        let every = config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = gallery.cleanup_expired().await {
                    tracing::warn!(error = %e, "Gallery cleanup failed");
                }
            }
        });
    }

    let app = routes::router(state, Some(prometheus_handle), config.max_upload_bytes);

    tracing::info!("Starting photo-strip-gen on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
