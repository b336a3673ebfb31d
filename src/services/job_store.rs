use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::job::{
    Job, JobId, JobStatus, JobUpdate, ProviderReport, ProviderState, ResultImage,
};

/// In-memory store of generation jobs.
///
/// All mutation goes through [`JobStore::update`], which validates the whole
/// update before touching the record and applies it under a single write lock,
/// so readers only ever see complete updates.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    retention: Duration,
}

impl JobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub async fn create(&self, job: Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::Duplicate(job.id));
        }
        tracing::debug!(job_id = %job.id, providers = job.providers.len(), "Job created");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Snapshot of a job. Jobs past the retention window read as not found
    /// even before the sweeper removes them.
    pub async fn get(&self, id: &JobId) -> Result<Job, JobStoreError> {
        let jobs = self.jobs.read().await;
        match jobs.get(id) {
            Some(job) if !is_older_than(job, self.retention) => Ok(job.clone()),
            _ => Err(JobStoreError::NotFound(id.clone())),
        }
    }

    /// Merge an update into one job and return the resulting snapshot.
    pub async fn update(&self, id: &JobId, update: JobUpdate) -> Result<Job, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.clone()))?;
        apply(job, update)?;
        Ok(job.clone())
    }

    /// Remove every job created more than `max_age` ago. Returns how many were removed.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !is_older_than(job, max_age));
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::info!(removed, remaining = jobs.len(), "Swept expired jobs");
        }
        removed
    }

    pub async fn remove(&self, id: &JobId) -> bool {
        self.jobs.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}

/// Periodically sweep jobs older than the store's retention window.
pub fn spawn_sweeper(store: Arc<JobStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            store.sweep(store.retention()).await;
        }
    })
}

fn is_older_than(job: &Job, max_age: Duration) -> bool {
    let age = Utc::now().signed_duration_since(job.created_at);
    age.to_std().map(|age| age >= max_age).unwrap_or(false)
}

fn apply(job: &mut Job, update: JobUpdate) -> Result<(), JobStoreError> {
    if job.status.is_terminal() {
        return Err(JobStoreError::Terminal {
            id: job.id.clone(),
            status: job.status,
        });
    }

    match update {
        JobUpdate::Started => {
            transition(job, JobStatus::Running)?;
            job.started_at = Some(Utc::now());
        }
        JobUpdate::ProviderFinished { provider, report } => {
            if job.status != JobStatus::Running {
                return Err(JobStoreError::InvalidTransition {
                    from: job.status,
                    to: JobStatus::Running,
                });
            }
            let slot = job
                .providers
                .iter_mut()
                .find(|slot| slot.provider == provider)
                .ok_or_else(|| JobStoreError::UnknownProvider(provider.clone()))?;
            if slot.state != ProviderState::Pending {
                return Err(JobStoreError::ProviderAlreadyReported(provider));
            }
            match report {
                ProviderReport::Done { images, warnings } => {
                    if images.is_empty() {
                        return Err(JobStoreError::Invariant(format!(
                            "provider {provider} reported success without images"
                        )));
                    }
                    slot.state = ProviderState::Done {
                        image_count: images.len(),
                    };
                    slot.images = images;
                    job.warnings.extend(warnings);
                }
                ProviderReport::Failed { reason } => {
                    slot.state = ProviderState::Failed { reason };
                }
            }
        }
        JobUpdate::Finalize => {
            if job.status != JobStatus::Running {
                return Err(JobStoreError::InvalidTransition {
                    from: job.status,
                    to: JobStatus::Succeeded,
                });
            }
            if let Some(pending) = job
                .providers
                .iter()
                .find(|slot| slot.state == ProviderState::Pending)
            {
                return Err(JobStoreError::Invariant(format!(
                    "provider {} has not reported",
                    pending.provider
                )));
            }

            let failures: Vec<String> = job
                .providers
                .iter()
                .filter_map(|slot| match &slot.state {
                    ProviderState::Failed { reason } => {
                        Some(format!("{}: {}", slot.provider, reason))
                    }
                    _ => None,
                })
                .collect();

            let results: Vec<ResultImage> = job
                .providers
                .iter_mut()
                .flat_map(|slot| std::mem::take(&mut slot.images))
                .collect();

            if failures.is_empty() && !results.is_empty() {
                transition(job, JobStatus::Succeeded)?;
                job.results = results;
            } else {
                let error = if failures.is_empty() {
                    "no provider produced any images".to_string()
                } else {
                    failures.join("; ")
                };
                transition(job, JobStatus::Failed)?;
                job.error = Some(error);
            }
            job.finished_at = Some(Utc::now());
        }
        JobUpdate::Fail { error } => {
            if error.trim().is_empty() {
                return Err(JobStoreError::Invariant(
                    "failed jobs need an error message".to_string(),
                ));
            }
            transition(job, JobStatus::Failed)?;
            for slot in &mut job.providers {
                slot.images.clear();
            }
            job.error = Some(error);
            job.finished_at = Some(Utc::now());
        }
    }
    Ok(())
}

fn transition(job: &mut Job, next: JobStatus) -> Result<(), JobStoreError> {
    if !job.status.can_transition_to(next) {
        return Err(JobStoreError::InvalidTransition {
            from: job.status,
            to: next,
        });
    }
    job.status = next;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Job {0} already exists")]
    Duplicate(JobId),

    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} is already {status}")]
    Terminal { id: JobId, status: JobStatus },

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job has no slot for provider {0}")]
    UnknownProvider(String),

    #[error("Provider {0} already reported for this job")]
    ProviderAlreadyReported(String),

    #[error("Job invariant violated: {0}")]
    Invariant(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobInputs;
    use crate::models::options::PromptOptions;

    fn inputs() -> JobInputs {
        JobInputs {
            image_size: 500,
            image_mime: "image/jpeg".to_string(),
            has_secondary: false,
            options: PromptOptions::default(),
            num_images: 1,
            prompt: "prompt".to_string(),
        }
    }

    fn job(id: &str, providers: &[&str]) -> Job {
        Job::new(JobId::from(id), inputs(), providers.iter().copied())
    }

    fn image(provider: &str, n: u8) -> ResultImage {
        ResultImage {
            provider: provider.to_string(),
            mime_type: "image/png".to_string(),
            bytes: vec![n],
            source: format!("https://cdn.example/{provider}/{n}.png"),
        }
    }

    fn done(provider: &str, images: Vec<ResultImage>) -> JobUpdate {
        JobUpdate::ProviderFinished {
            provider: provider.to_string(),
            report: ProviderReport::Done {
                images,
                warnings: Vec::new(),
            },
        }
    }

    fn store() -> JobStore {
        JobStore::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let store = store();
        store.create(job("a", &["fal"])).await.unwrap();
        let err = store.create(job("a", &["fal"])).await.unwrap_err();
        assert!(matches!(err, JobStoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_missing_job_is_distinct_from_pending() {
        let store = store();
        store.create(job("pending", &["fal"])).await.unwrap();

        let pending = store.get(&JobId::from("pending")).await.unwrap();
        assert_eq!(pending.status, JobStatus::Pending);

        let missing = store.get(&JobId::from("never")).await.unwrap_err();
        assert!(matches!(missing, JobStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_full_success_lifecycle() {
        let store = store();
        let id = JobId::from("ok");
        store.create(job("ok", &["fal", "gemini"])).await.unwrap();
        store.update(&id, JobUpdate::Started).await.unwrap();
        store.update(&id, done("gemini", vec![image("gemini", 2)])).await.unwrap();
        store.update(&id, done("fal", vec![image("fal", 1)])).await.unwrap();

        let finished = store.update(&id, JobUpdate::Finalize).await.unwrap();
        assert_eq!(finished.status, JobStatus::Succeeded);
        assert!(finished.error.is_none());
        // provider order, not completion order
        let providers: Vec<&str> = finished.results.iter().map(|r| r.provider.as_str()).collect();
        assert_eq!(providers, vec!["fal", "gemini"]);
    }

    #[tokio::test]
    async fn test_any_provider_failure_fails_job() {
        let store = store();
        let id = JobId::from("partial");
        store.create(job("partial", &["fal", "replicate"])).await.unwrap();
        store.update(&id, JobUpdate::Started).await.unwrap();
        store.update(&id, done("fal", vec![image("fal", 1)])).await.unwrap();
        store
            .update(
                &id,
                JobUpdate::ProviderFinished {
                    provider: "replicate".to_string(),
                    report: ProviderReport::Failed {
                        reason: "GenerationFailed: boom".to_string(),
                    },
                },
            )
            .await
            .unwrap();

        let finished = store.update(&id, JobUpdate::Finalize).await.unwrap();
        assert_eq!(finished.status, JobStatus::Failed);
        assert!(finished.results.is_empty());
        assert!(finished.error.unwrap().contains("replicate"));
    }

    #[tokio::test]
    async fn test_terminal_state_is_immutable() {
        let store = store();
        let id = JobId::from("t");
        store.create(job("t", &["fal"])).await.unwrap();
        store.update(&id, JobUpdate::Started).await.unwrap();
        store
            .update(&id, JobUpdate::Fail { error: "timed out".to_string() })
            .await
            .unwrap();

        let err = store.update(&id, done("fal", vec![image("fal", 1)])).await.unwrap_err();
        assert!(matches!(err, JobStoreError::Terminal { .. }));
        let err = store.update(&id, JobUpdate::Started).await.unwrap_err();
        assert!(matches!(err, JobStoreError::Terminal { .. }));

        let snapshot = store.get(&id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("timed out"));
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record_untouched() {
        let store = store();
        let id = JobId::from("u");
        store.create(job("u", &["fal"])).await.unwrap();

        // not started yet
        let err = store.update(&id, done("fal", vec![image("fal", 1)])).await.unwrap_err();
        assert!(matches!(err, JobStoreError::InvalidTransition { .. }));

        store.update(&id, JobUpdate::Started).await.unwrap();
        let err = store.update(&id, done("fal", Vec::new())).await.unwrap_err();
        assert!(matches!(err, JobStoreError::Invariant(_)));
        let err = store.update(&id, JobUpdate::Finalize).await.unwrap_err();
        assert!(matches!(err, JobStoreError::Invariant(_)));

        let snapshot = store.get(&id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.providers[0].state, ProviderState::Pending);
    }

    #[tokio::test]
    async fn test_provider_reports_once() {
        let store = store();
        let id = JobId::from("once");
        store.create(job("once", &["fal"])).await.unwrap();
        store.update(&id, JobUpdate::Started).await.unwrap();
        store.update(&id, done("fal", vec![image("fal", 1)])).await.unwrap();
        let err = store.update(&id, done("fal", vec![image("fal", 2)])).await.unwrap_err();
        assert!(matches!(err, JobStoreError::ProviderAlreadyReported(_)));
        let err = store.update(&id, done("midjourney", vec![image("x", 1)])).await.unwrap_err();
        assert!(matches!(err, JobStoreError::UnknownProvider(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_disjoint_updates_are_all_kept() {
        let providers = ["fal", "replicate", "gemini"];
        for round in 0..20 {
            let store = Arc::new(store());
            let id = JobId::from(format!("race-{round}"));
            store
                .create(Job::new(id.clone(), inputs(), providers))
                .await
                .unwrap();
            store.update(&id, JobUpdate::Started).await.unwrap();

            let writers = providers.iter().enumerate().map(|(n, provider)| {
                let store = store.clone();
                let id = id.clone();
                let provider = provider.to_string();
                tokio::spawn(async move {
                    let images = vec![image(&provider, n as u8)];
                    store.update(&id, done(&provider, images)).await
                })
            });
            for result in futures::future::join_all(writers).await {
                result.unwrap().unwrap();
            }

            let job = store.update(&id, JobUpdate::Finalize).await.unwrap();
            assert_eq!(job.status, JobStatus::Succeeded);
            assert_eq!(job.results.len(), 3);
            for slot in &job.providers {
                assert_eq!(slot.state, ProviderState::Done { image_count: 1 });
            }
        }
    }

    #[tokio::test]
    async fn test_reads_do_not_mutate() {
        let store = store();
        let id = JobId::from("r");
        store.create(job("r", &["fal"])).await.unwrap();
        store.update(&id, JobUpdate::Started).await.unwrap();
        store.update(&id, done("fal", vec![image("fal", 7)])).await.unwrap();
        store.update(&id, JobUpdate::Finalize).await.unwrap();

        let first = store.get(&id).await.unwrap();
        let second = store.get(&id).await.unwrap();
        assert_eq!(first.results, second.results);
        assert_eq!(first.status, second.status);
        assert_eq!(first.finished_at, second.finished_at);
    }

    #[tokio::test]
    async fn test_sweep_and_expiry() {
        let store = store();
        let mut old = job("old", &["fal"]);
        old.created_at = Utc::now() - chrono::Duration::hours(2);
        store.create(old).await.unwrap();
        store.create(job("fresh", &["fal"])).await.unwrap();

        // expired records read as not found before the sweep runs
        assert!(matches!(
            store.get(&JobId::from("old")).await,
            Err(JobStoreError::NotFound(_))
        ));

        assert_eq!(store.sweep(Duration::from_secs(3600)).await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&JobId::from("fresh")).await.is_ok());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = store();
        store.create(job("gone", &["fal"])).await.unwrap();
        assert!(store.remove(&JobId::from("gone")).await);
        assert!(!store.remove(&JobId::from("gone")).await);
        assert!(store.is_empty().await);
    }
}
