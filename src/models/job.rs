use std::fmt;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::options::PromptOptions;

/// Opaque job identifier: `<content hash>_<unix millis>_<random suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Derive a fresh id from the uploaded image bytes.
    pub fn generate(image: &[u8]) -> Self {
        let digest = Sha256::digest(image);
        let hash = hex::encode(digest);
        let millis = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string();
        JobId(format!("{}_{}_{}", &hash[..12], millis, &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First segment of the id: the truncated content hash of the primary image.
    pub fn content_hash(&self) -> &str {
        self.0.split('_').next().unwrap_or_default()
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        JobId(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        JobId(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What was submitted for a job. Image bytes are not retained here.
#[derive(Debug, Clone, Serialize)]
pub struct JobInputs {
    pub image_size: usize,
    pub image_mime: String,
    pub has_secondary: bool,
    pub options: PromptOptions,
    pub num_images: u8,
    pub prompt: String,
}

/// One materialized output image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultImage {
    pub provider: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// The locator the provider returned (URL, or `inline` for embedded payloads).
    pub source: String,
}

impl ResultImage {
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderState {
    Pending,
    Done { image_count: usize },
    Failed { reason: String },
}

/// Sub-record written by exactly one provider worker.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSlot {
    pub provider: String,
    #[serde(flatten)]
    pub state: ProviderState,
    #[serde(skip)]
    pub images: Vec<ResultImage>,
}

impl ProviderSlot {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            state: ProviderState::Pending,
            images: Vec::new(),
        }
    }
}

/// A generation job as held by the job store.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub inputs: JobInputs,
    pub providers: Vec<ProviderSlot>,
    pub results: Vec<ResultImage>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new<I, S>(id: JobId, inputs: JobInputs, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            status: JobStatus::Pending,
            inputs,
            providers: providers.into_iter().map(ProviderSlot::new).collect(),
            results: Vec::new(),
            warnings: Vec::new(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn slot(&self, provider: &str) -> Option<&ProviderSlot> {
        self.providers.iter().find(|slot| slot.provider == provider)
    }
}

/// What one provider worker reports back for its own slot.
#[derive(Debug, Clone)]
pub enum ProviderReport {
    Done {
        images: Vec<ResultImage>,
        warnings: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

/// A partial update merged atomically into a job record.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    /// Pending -> Running.
    Started,
    /// Fill in one provider's sub-record. Other providers' slots are untouched.
    ProviderFinished {
        provider: String,
        report: ProviderReport,
    },
    /// Aggregate all provider slots into the terminal state.
    Finalize,
    /// Running -> Failed without waiting on provider slots.
    Fail { error: String },
}
