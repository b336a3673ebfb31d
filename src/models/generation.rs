use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::{Job, JobId, JobStatus, ProviderSlot};

/// Text fields of the `/generate` multipart form.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerateFields {
    #[garde(length(min = 1, max = 32))]
    pub frame_color: Option<String>,

    #[garde(length(min = 1, max = 16))]
    pub layout: Option<String>,

    #[garde(length(min = 1, max = 16))]
    pub color_mode: Option<String>,

    #[garde(length(min = 1, max = 32))]
    pub style: Option<String>,

    #[garde(range(min = 1, max = 4))]
    pub num_images: u8,
}

/// Response after accepting an upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub job_id: JobId,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub id: Option<String>,
}

/// Polling view of a job.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub success: bool,
    pub job_id: JobId,
    pub status: JobStatus,
    pub result_ready: bool,
    pub result_url: Option<String>,
    pub result_urls: Vec<String>,
    pub result_filename: String,
    pub processing_started: bool,
    pub processing_timestamp: Option<f64>,
    pub providers: Vec<ProviderSlot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressResponse {
    pub fn from_job(job: &Job) -> Self {
        let result_urls: Vec<String> = job.results.iter().map(|image| image.data_uri()).collect();
        let extension = job
            .results
            .first()
            .map(|image| extension_for_mime(&image.mime_type))
            .unwrap_or("png");

        Self {
            success: job.status != JobStatus::Failed,
            job_id: job.id.clone(),
            status: job.status,
            result_ready: job.status == JobStatus::Succeeded,
            result_url: result_urls.first().cloned(),
            result_urls,
            result_filename: format!("photo_strip_{}.{}", job.id.content_hash(), extension),
            processing_started: job.status != JobStatus::Pending,
            processing_timestamp: job
                .started_at
                .map(|at| at.timestamp_millis() as f64 / 1000.0),
            providers: job.providers.clone(),
            warnings: job.warnings.clone(),
            error: job.error.clone(),
        }
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}
