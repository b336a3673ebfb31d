//! Clients for the external image-generation services.
//!
//! Every provider takes the same [`GenerationRequest`] and hands back a
//! [`ResultSet`]: an ordered, non-empty list of locators pointing at the
//! generated images. Provider-specific payload shapes are decoded at this
//! boundary so the rest of the service never sees them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::models::job::JobId;
use crate::services::assets::InlineImage;

pub mod fal;
pub mod gemini;
pub mod replicate;

pub use fal::FalProvider;
pub use gemini::GeminiProvider;
pub use replicate::ReplicateProvider;

/// Everything a provider needs for one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub job_id: JobId,
    pub prompt: String,
    /// User photo(s) first, then logo, then QR code.
    pub images: Vec<InlineImage>,
    pub num_images: u8,
}

/// Where a generated image can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultLocator {
    Url(String),
    Inline(InlineImage),
}

/// Ordered, non-empty set of result locators from one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    locators: Vec<ResultLocator>,
}

impl ResultSet {
    pub fn new(locators: Vec<ResultLocator>) -> Result<Self, GenerationError> {
        if locators.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(Self { locators })
    }

    pub fn from_urls<I: IntoIterator<Item = String>>(urls: I) -> Result<Self, GenerationError> {
        Self::new(urls.into_iter().map(ResultLocator::Url).collect())
    }

    pub fn locators(&self) -> &[ResultLocator] {
        &self.locators
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    pub fn extend(&mut self, other: ResultSet) {
        self.locators.extend(other.locators);
    }
}

/// A single image reference: `{"url": ...}` or a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageRef {
    Object { url: String },
    Bare(String),
}

impl ImageRef {
    fn into_url(self) -> String {
        match self {
            ImageRef::Object { url } | ImageRef::Bare(url) => url,
        }
    }
}

/// The payload shapes returned by the nano-banana family of models.
///
/// Variant order matters: a payload carrying `image` wins over `images`,
/// which wins over a top-level `url`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImagePayload {
    Single { image: ImageRef },
    Many { images: Vec<ImageRef> },
    Direct { url: String },
}

impl ResultSet {
    /// Decode one of the known image payload shapes into a result set.
    pub fn from_image_payload(payload: serde_json::Value) -> Result<Self, GenerationError> {
        let decoded: ImagePayload = serde_json::from_value(payload)
            .map_err(|e| GenerationError::Decode(format!("unrecognised image payload: {e}")))?;

        let urls: Vec<String> = match decoded {
            ImagePayload::Single { image } => vec![image.into_url()],
            ImagePayload::Many { images } => images.into_iter().map(ImageRef::into_url).collect(),
            ImagePayload::Direct { url } => vec![url],
        };

        Self::from_urls(urls.into_iter().filter(|url| !url.trim().is_empty()))
    }
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &GenerationRequest) -> Result<ResultSet, GenerationError>;
}

/// Call a provider, retrying transient failures up to `max_attempts` total attempts.
pub async fn generate_with_retries(
    provider: &dyn ImageProvider,
    request: &GenerationRequest,
    max_attempts: u32,
    backoff: Duration,
) -> Result<ResultSet, GenerationError> {
    let mut attempt = 1;
    loop {
        match provider.generate(request).await {
            Ok(set) => return Ok(set),
            Err(e) if attempt < max_attempts && e.is_transient() => {
                tracing::warn!(
                    job_id = %request.job_id,
                    provider = provider.name(),
                    attempt,
                    error = %e,
                    "Transient provider failure, retrying"
                );
                tokio::time::sleep(backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Build the providers enabled by the configuration. FAL is always first.
pub fn build_providers(config: &AppConfig, http: Client) -> Vec<Arc<dyn ImageProvider>> {
    let mut providers: Vec<Arc<dyn ImageProvider>> = vec![Arc::new(FalProvider::new(
        http.clone(),
        &config.fal_key,
        &config.fal_model,
        &config.fal_queue_base,
        config.poll_interval(),
    ))];

    if let Some(token) = config.replicate_token() {
        providers.push(Arc::new(ReplicateProvider::new(
            http.clone(),
            token,
            &config.replicate_model,
            &config.replicate_api_base,
            config.poll_interval(),
        )));
    }

    if let Some(key) = config.gemini_key() {
        providers.push(Arc::new(GeminiProvider::new(
            http,
            key,
            &config.gemini_model,
            &config.gemini_api_base,
        )));
    }

    providers
}

/// Turn a non-2xx response into [`GenerationError::Api`].
pub(crate) async fn ensure_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(GenerationError::Api {
        provider,
        status: status.as_u16(),
        message: truncate(&message, 512),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Provider returned no images")]
    Empty,

    #[error("Generation was rejected: {0}")]
    Rejected(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl GenerationError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Http(e) => e.is_connect() || e.is_timeout(),
            GenerationError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
