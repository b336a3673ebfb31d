use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::models::job::{JobStatus, JobUpdate, ProviderReport};
use crate::routes::metrics::{
    JOBS_FAILED, JOBS_STARTED, JOBS_SUCCEEDED, PROCESSING_SECONDS, PROVIDER_CALLS_FAILED,
};
use crate::services::job_store::{JobStore, JobStoreError};
use crate::services::materialize::{MaterializeError, Materializer};
use crate::services::providers::{
    generate_with_retries, GenerationError, GenerationRequest, ImageProvider,
};

/// Fans a job out to every configured provider and records the outcome.
pub struct Orchestrator {
    store: Arc<JobStore>,
    providers: Vec<Arc<dyn ImageProvider>>,
    materializer: Materializer,
    provider_timeout: Duration,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<JobStore>,
        providers: Vec<Arc<dyn ImageProvider>>,
        materializer: Materializer,
        provider_timeout: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            providers,
            materializer,
            provider_timeout,
            max_attempts: max_attempts.max(1),
            retry_backoff: Duration::from_secs(2),
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Start processing a job that already exists in the store. Returns immediately.
    pub fn submit(self: &Arc<Self>, request: GenerationRequest) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let job_id = request.job_id.clone();
            if let Err(e) = orchestrator.run(request).await {
                tracing::error!(job_id = %job_id, error = %e, "Job bookkeeping failed");
            }
        })
    }

    /// Drive one job from Pending to a terminal state.
    pub async fn run(&self, request: GenerationRequest) -> Result<JobStatus, JobStoreError> {
        let job_id = request.job_id.clone();
        let started = Instant::now();
        self.store.update(&job_id, JobUpdate::Started).await?;
        metrics::counter!(JOBS_STARTED).increment(1);

        tracing::info!(
            job_id = %job_id,
            providers = ?self.provider_names(),
            num_images = request.num_images,
            "Generation started"
        );

        let request = Arc::new(request);
        let mut tasks = JoinSet::new();
        for provider in &self.providers {
            let provider = Arc::clone(provider);
            let request = Arc::clone(&request);
            let store = Arc::clone(&self.store);
            let materializer = self.materializer.clone();
            let timeout = self.provider_timeout;
            let max_attempts = self.max_attempts;
            let backoff = self.retry_backoff;

            tasks.spawn(async move {
                let name = provider.name();
                let call = run_provider(
                    provider.as_ref(),
                    &request,
                    &materializer,
                    max_attempts,
                    backoff,
                );
                let report = match tokio::time::timeout(timeout, call).await {
                    Ok(report) => report,
                    Err(_) => ProviderReport::Failed {
                        reason: ProviderFailure::Generation(GenerationError::Timeout(timeout))
                            .to_string(),
                    },
                };

                if let ProviderReport::Failed { reason } = &report {
                    metrics::counter!(PROVIDER_CALLS_FAILED, "provider" => name).increment(1);
                    tracing::warn!(job_id = %request.job_id, provider = name, reason = %reason, "Provider failed");
                }

                store
                    .update(
                        &request.job_id,
                        JobUpdate::ProviderFinished {
                            provider: name.to_string(),
                            report,
                        },
                    )
                    .await
            });
        }

        let mut bookkeeping_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!(job_id = %job_id, error = %e, "Provider result not recorded");
                    bookkeeping_error.get_or_insert_with(|| e.to_string());
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Provider task aborted");
                    bookkeeping_error.get_or_insert_with(|| format!("provider task aborted: {e}"));
                }
            }
        }

        let update = match bookkeeping_error {
            None => JobUpdate::Finalize,
            Some(error) => JobUpdate::Fail { error },
        };
        let job = self.store.update(&job_id, update).await?;

        let elapsed = started.elapsed();
        metrics::histogram!(PROCESSING_SECONDS).record(elapsed.as_secs_f64());
        match job.status {
            JobStatus::Succeeded => {
                metrics::counter!(JOBS_SUCCEEDED).increment(1);
                tracing::info!(
                    job_id = %job_id,
                    images = job.results.len(),
                    warnings = job.warnings.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Generation succeeded"
                );
            }
            _ => {
                metrics::counter!(JOBS_FAILED).increment(1);
                tracing::warn!(
                    job_id = %job_id,
                    error = job.error.as_deref().unwrap_or_default(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Generation failed"
                );
            }
        }

        Ok(job.status)
    }
}

async fn run_provider(
    provider: &dyn ImageProvider,
    request: &GenerationRequest,
    materializer: &Materializer,
    max_attempts: u32,
    backoff: Duration,
) -> ProviderReport {
    let outcome = async {
        let set = generate_with_retries(provider, request, max_attempts, backoff)
            .await
            .map_err(ProviderFailure::Generation)?;
        tracing::debug!(
            job_id = %request.job_id,
            provider = provider.name(),
            locators = set.len(),
            "Provider returned results"
        );
        materializer
            .materialize(provider.name(), &set)
            .await
            .map_err(ProviderFailure::Download)
    }
    .await;

    match outcome {
        Ok(materialized) => ProviderReport::Done {
            images: materialized.images,
            warnings: materialized.warnings,
        },
        Err(e) => ProviderReport::Failed {
            reason: e.to_string(),
        },
    }
}

/// Why a provider produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    #[error("GenerationFailed: {0}")]
    Generation(GenerationError),

    #[error("TotalDownloadFailure: {0}")]
    Download(MaterializeError),
}
