use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ensure_success, GenerationError, GenerationRequest, ImageProvider, ResultSet};

/// Client for Replicate predictions on an official model.
pub struct ReplicateProvider {
    http: Client,
    api_token: String,
    model: String,
    api_base: String,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

/// Replicate `output`: a single URL or a list of URLs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    One(String),
    Many(Vec<String>),
}

impl ReplicateProvider {
    pub fn new(
        http: Client,
        api_token: &str,
        model: &str,
        api_base: &str,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http,
            api_token: api_token.to_string(),
            model: model.trim().trim_matches('/').to_string(),
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            poll_interval,
        }
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/models/{}/predictions", self.api_base, self.model)
    }

    async fn run_prediction(
        &self,
        request: &GenerationRequest,
    ) -> Result<ResultSet, GenerationError> {
        let image_input: Vec<String> = request.images.iter().map(|image| image.data_uri()).collect();
        let body = json!({
            "input": {
                "prompt": request.prompt,
                "image_input": image_input,
                "output_format": "png",
            }
        });

        let response = self
            .http
            .post(self.predictions_endpoint())
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        let mut prediction: Prediction = ensure_success("replicate", response).await?.json().await?;

        while matches!(prediction.status.as_str(), "starting" | "processing") {
            let poll_url = prediction
                .urls
                .as_ref()
                .and_then(|urls| urls.get.clone())
                .ok_or_else(|| GenerationError::Decode("prediction missing poll URL".to_string()))?;
            tracing::trace!(
                job_id = %request.job_id,
                prediction_id = %prediction.id,
                status = %prediction.status,
                "Replicate prediction pending"
            );
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .http
                .get(&poll_url)
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            prediction = ensure_success("replicate", response).await?.json().await?;
        }

        match prediction.status.as_str() {
            "succeeded" => {}
            "failed" | "canceled" => {
                let reason = prediction
                    .error
                    .map(|e| match e {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| prediction.status.clone());
                return Err(GenerationError::Rejected(reason));
            }
            other => {
                return Err(GenerationError::Decode(format!(
                    "unexpected prediction status {other}"
                )))
            }
        }

        let output = prediction.output.ok_or(GenerationError::Empty)?;
        let urls = match serde_json::from_value::<PredictionOutput>(output) {
            Ok(PredictionOutput::One(url)) => vec![url],
            Ok(PredictionOutput::Many(urls)) => urls,
            Err(e) => {
                return Err(GenerationError::Decode(format!(
                    "unrecognised prediction output: {e}"
                )))
            }
        };
        ResultSet::from_urls(urls)
    }
}

#[async_trait]
impl ImageProvider for ReplicateProvider {
    fn name(&self) -> &'static str {
        "replicate"
    }

    /// One prediction per requested variant, run in sequence.
    async fn generate(&self, request: &GenerationRequest) -> Result<ResultSet, GenerationError> {
        tracing::info!(
            job_id = %request.job_id,
            model = %self.model,
            variants = request.num_images,
            "Submitting Replicate prediction"
        );

        let mut results = self.run_prediction(request).await?;
        for _ in 1..request.num_images.max(1) {
            results.extend(self.run_prediction(request).await?);
        }
        Ok(results)
    }
}
