use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::AppConfig;
use crate::services::{
    assets::AssetLoader,
    gallery::GalleryStore,
    job_store::JobStore,
    materialize::Materializer,
    orchestrator::Orchestrator,
    providers::{self, ImageProvider},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub assets: Arc<AssetLoader>,
    pub gallery: Option<Arc<GalleryStore>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        jobs: JobStore,
        providers: Vec<Arc<dyn ImageProvider>>,
        materializer: Materializer,
        assets: AssetLoader,
        gallery: Option<GalleryStore>,
        config: &AppConfig,
    ) -> Self {
        let jobs = Arc::new(jobs);
        let orchestrator = Orchestrator::new(
            jobs.clone(),
            providers,
            materializer,
            config.provider_timeout(),
            config.provider_max_attempts,
        );
        Self {
            jobs,
            orchestrator: Arc::new(orchestrator),
            assets: Arc::new(assets),
            gallery: gallery.map(Arc::new),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Wire up every service from configuration. The gallery is attached separately
    /// because it needs a live database pool.
    pub fn from_config(
        config: &AppConfig,
        gallery: Option<GalleryStore>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.provider_timeout())
            .build()?;

        Ok(Self::new(
            JobStore::new(config.job_retention()),
            providers::build_providers(config, http.clone()),
            Materializer::new(http),
            AssetLoader::new(&config.asset_dir),
            gallery,
            config,
        ))
    }
}
