use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    ensure_success, GenerationError, GenerationRequest, ImageProvider, ResultLocator, ResultSet,
};
use crate::services::assets::InlineImage;

/// Client for Gemini image-preview models via `generateContent`.
///
/// Gemini returns image bytes inline, so its locators never need a download.
pub struct GeminiProvider {
    http: Client,
    api_key: String,
    model: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: Option<String>,
    data: String,
}

impl GeminiProvider {
    pub fn new(http: Client, api_key: &str, model: &str, api_base: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.trim().trim_start_matches("models/").to_string(),
            api_base: api_base.trim().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn build_payload(request: &GenerationRequest) -> Value {
        let mut parts: Vec<Value> = request
            .images
            .iter()
            .map(|image| {
                json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": image.base64(),
                    }
                })
            })
            .collect();
        parts.push(json!({ "text": request.prompt }));

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "candidateCount": request.num_images.max(1),
                "responseModalities": ["IMAGE", "TEXT"],
            },
        })
    }

    fn extract_images(response: GenerateContentResponse) -> Result<ResultSet, GenerationError> {
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(GenerationError::Rejected(format!("prompt blocked: {reason}")));
        }

        let mut locators = Vec::new();
        for candidate in response.candidates {
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            for inline in parts.into_iter().filter_map(|part| part.inline_data) {
                if inline.data.is_empty() {
                    continue;
                }
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(inline.data.as_bytes())
                    .map_err(|e| GenerationError::Decode(format!("invalid inline image: {e}")))?;
                let image = match inline.mime_type {
                    Some(mime_type) => InlineImage { mime_type, bytes },
                    None => InlineImage::from_bytes(bytes),
                };
                locators.push(ResultLocator::Inline(image));
            }
        }
        ResultSet::new(locators)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<ResultSet, GenerationError> {
        tracing::info!(
            job_id = %request.job_id,
            model = %self.model,
            "Submitting Gemini generateContent request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_payload(request))
            .send()
            .await?;
        let body: GenerateContentResponse = ensure_success("gemini", response).await?.json().await?;

        Self::extract_images(body)
    }
}
