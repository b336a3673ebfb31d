use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::models::job::ResultImage;
use crate::services::providers::{ResultLocator, ResultSet};

const DEFAULT_MIME: &str = "image/png";

/// Images that survived materialization, plus warnings for the ones that did not.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub images: Vec<ResultImage>,
    pub warnings: Vec<String>,
}

/// Downloads result locators so the browser never depends on provider URL lifetimes.
#[derive(Clone)]
pub struct Materializer {
    http: Client,
}

impl Materializer {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Fetch every locator. Individual failures become warnings; losing all of
    /// them is [`MaterializeError::TotalDownloadFailure`].
    pub async fn materialize(
        &self,
        provider: &str,
        set: &ResultSet,
    ) -> Result<Materialized, MaterializeError> {
        let mut images = Vec::with_capacity(set.len());
        let mut warnings = Vec::new();

        for (index, locator) in set.locators().iter().enumerate() {
            let fetched = match locator {
                ResultLocator::Inline(inline) => Ok(ResultImage {
                    provider: provider.to_string(),
                    mime_type: inline.mime_type.clone(),
                    bytes: inline.bytes.clone(),
                    source: "inline".to_string(),
                }),
                ResultLocator::Url(url) if url.starts_with("data:") => decode_data_uri(url)
                    .map(|(mime_type, bytes)| ResultImage {
                        provider: provider.to_string(),
                        mime_type,
                        bytes,
                        source: "inline".to_string(),
                    }),
                ResultLocator::Url(url) => self.download(provider, url).await,
            };

            match fetched {
                Ok(image) => images.push(image),
                Err(reason) => {
                    tracing::warn!(provider, index, reason = %reason, "Dropping result image");
                    warnings.push(format!("{provider} image {}: {reason}", index + 1));
                }
            }
        }

        if images.is_empty() {
            return Err(MaterializeError::TotalDownloadFailure {
                attempted: set.len(),
                reasons: warnings,
            });
        }

        if !warnings.is_empty() {
            tracing::warn!(
                provider,
                kept = images.len(),
                dropped = warnings.len(),
                "Partial download failure"
            );
        }

        Ok(Materialized { images, warnings })
    }

    async fn download(&self, provider: &str, url: &str) -> Result<ResultImage, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("download failed: {e}"))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(format!("download returned status {}", status.as_u16()));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .filter(|value| value.starts_with("image/"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("failed reading body: {e}"))?
            .to_vec();
        if bytes.is_empty() {
            return Err("download returned an empty body".to_string());
        }

        let mime_type = declared.unwrap_or_else(|| sniff_mime(&bytes));

        Ok(ResultImage {
            provider: provider.to_string(),
            mime_type,
            bytes,
            source: url.to_string(),
        })
    }
}

fn sniff_mime(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(DEFAULT_MIME)
        .to_string()
}

/// Split a `data:<mime>;base64,<payload>` URI.
fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "malformed data URI".to_string())?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| "data URI is not base64-encoded".to_string())?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| format!("invalid base64 in data URI: {e}"))?;
    let mime = if mime.is_empty() {
        sniff_mime(&bytes)
    } else {
        mime.to_string()
    };
    Ok((mime, bytes))
}

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("None of the {attempted} result images could be downloaded: {}", reasons.join("; "))]
    TotalDownloadFailure {
        attempted: usize,
        reasons: Vec<String>,
    },
}
