use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ensure_success, GenerationError, GenerationRequest, ImageProvider, ResultSet};

/// Client for the FAL queue API (nano-banana edit models).
///
/// A job is submitted to the queue, its status URL is polled until the
/// request completes, and the result is fetched from the response URL.
/// The caller bounds the whole exchange with a timeout.
pub struct FalProvider {
    http: Client,
    api_key: String,
    model: String,
    queue_base: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct QueueSubmission {
    request_id: String,
    status_url: Option<String>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
}

impl FalProvider {
    pub fn new(
        http: Client,
        api_key: &str,
        model: &str,
        queue_base: &str,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.trim().trim_matches('/').to_string(),
            queue_base: queue_base.trim().trim_end_matches('/').to_string(),
            poll_interval,
        }
    }

    fn submit_url(&self) -> String {
        format!("{}/{}", self.queue_base, self.model)
    }

    /// Request URLs live under the app id (`owner/name`), without any sub-path.
    fn request_url(&self, request_id: &str) -> String {
        let app_id: Vec<&str> = self.model.split('/').take(2).collect();
        format!(
            "{}/{}/requests/{}",
            self.queue_base,
            app_id.join("/"),
            request_id
        )
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    async fn wait_for_completion(
        &self,
        status_url: &str,
        request: &GenerationRequest,
    ) -> Result<(), GenerationError> {
        loop {
            let response = self
                .http
                .get(status_url)
                .header(AUTHORIZATION, self.auth_header())
                .send()
                .await?;
            let status: QueueStatus = ensure_success("fal", response).await?.json().await?;

            match status.status.as_str() {
                "COMPLETED" => return Ok(()),
                "IN_QUEUE" | "IN_PROGRESS" => {
                    tracing::trace!(job_id = %request.job_id, status = %status.status, "FAL request pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
                other => {
                    return Err(GenerationError::Rejected(format!(
                        "unexpected FAL queue status {other}"
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl ImageProvider for FalProvider {
    fn name(&self) -> &'static str {
        "fal"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ResultSet, GenerationError> {
        let image_urls: Vec<String> = request.images.iter().map(|image| image.data_uri()).collect();
        let body = json!({
            "prompt": request.prompt,
            "image_urls": image_urls,
            "num_images": request.num_images.max(1),
        });

        tracing::info!(
            job_id = %request.job_id,
            model = %self.model,
            images = image_urls.len(),
            "Submitting FAL generation request"
        );

        let response = self
            .http
            .post(self.submit_url())
            .header(AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await?;
        let submission: QueueSubmission = ensure_success("fal", response).await?.json().await?;

        let status_url = submission
            .status_url
            .unwrap_or_else(|| format!("{}/status", self.request_url(&submission.request_id)));
        let response_url = submission
            .response_url
            .unwrap_or_else(|| self.request_url(&submission.request_id));

        tracing::debug!(
            job_id = %request.job_id,
            request_id = %submission.request_id,
            "FAL request queued"
        );

        self.wait_for_completion(&status_url, request).await?;

        let response = self
            .http
            .get(&response_url)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;
        let payload: Value = ensure_success("fal", response).await?.json().await?;

        ResultSet::from_image_payload(payload)
    }
}
