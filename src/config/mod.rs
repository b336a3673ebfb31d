use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// FAL API key. Required.
    pub fal_key: String,

    /// FAL model path used for the edit call.
    #[serde(default = "default_fal_model")]
    pub fal_model: String,

    /// FAL queue API base URL
    #[serde(default = "default_fal_queue_base")]
    pub fal_queue_base: String,

    /// Replicate API token. Enables the Replicate provider when set.
    pub replicate_api_token: Option<String>,

    #[serde(default = "default_replicate_model")]
    pub replicate_model: String,

    #[serde(default = "default_replicate_api_base")]
    pub replicate_api_base: String,

    /// Gemini API key. Enables the Gemini provider when set.
    pub gemini_api_key: Option<String>,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_api_base")]
    pub gemini_api_base: String,

    /// PostgreSQL connection string for the gallery. Gallery endpoints are disabled without it.
    pub database_url: Option<String>,

    /// Public URL prefix used when building gallery view links.
    pub public_base_url: Option<String>,

    /// Directory holding `logo.png` and `QR.png`.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,

    /// How long job records stay readable, in seconds.
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Upper bound on one provider call, generation and download included.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Delay between FAL queue / Replicate prediction status checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Attempts per provider call; only transient failures are retried.
    #[serde(default = "default_provider_max_attempts")]
    pub provider_max_attempts: u32,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_gallery_ttl_hours")]
    pub gallery_ttl_hours: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_fal_model() -> String {
    "fal-ai/nano-banana-pro/edit".to_string()
}

fn default_fal_queue_base() -> String {
    "https://queue.fal.run".to_string()
}

fn default_replicate_model() -> String {
    "google/nano-banana".to_string()
}

fn default_replicate_api_base() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-image-preview".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("static_image")
}

fn default_job_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_provider_timeout_secs() -> u64 {
    180
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_provider_max_attempts() -> u32 {
    1
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_gallery_ttl_hours() -> i64 {
    24
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: AppConfig = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with defaults for everything except the FAL key.
    pub fn with_fal_key(fal_key: impl Into<String>) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fal_key: fal_key.into(),
            fal_model: default_fal_model(),
            fal_queue_base: default_fal_queue_base(),
            replicate_api_token: None,
            replicate_model: default_replicate_model(),
            replicate_api_base: default_replicate_api_base(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_api_base: default_gemini_api_base(),
            database_url: None,
            public_base_url: None,
            asset_dir: default_asset_dir(),
            job_retention_secs: default_job_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            provider_max_attempts: default_provider_max_attempts(),
            max_upload_bytes: default_max_upload_bytes(),
            gallery_ttl_hours: default_gallery_ttl_hours(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fal_key.trim().is_empty() {
            return Err(ConfigError::Invalid("FAL_KEY must not be empty".to_string()));
        }
        if self.provider_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "PROVIDER_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.provider_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "PROVIDER_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Non-empty key for an optional provider.
    pub fn replicate_token(&self) -> Option<&str> {
        non_empty(self.replicate_api_token.as_deref())
    }

    pub fn gemini_key(&self) -> Option<&str> {
        non_empty(self.gemini_api_key.as_deref())
    }

    pub fn database(&self) -> Option<&str> {
        non_empty(self.database_url.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
