use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::job::JobId;
use crate::services::assets::AssetError;
use crate::services::gallery::GalleryError;
use crate::services::job_store::JobStoreError;

/// Errors returned synchronously to the HTTP caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Uploaded image exceeds the {0} byte limit.")]
    TooLarge(usize),

    #[error("Unsupported image format.")]
    UnsupportedImage,

    #[error("Job {0} not found or expired.")]
    JobNotFound(JobId),

    #[error("{0}")]
    NotReady(String),

    #[error("Gallery item {0} not found or expired.")]
    GalleryNotFound(String),

    #[error("Gallery storage is not configured.")]
    GalleryUnavailable,

    #[error("Server is missing a required asset.")]
    MissingAsset(#[from] AssetError),

    #[error("An internal server error occurred.")]
    Internal(String),
}

impl From<JobStoreError> for ApiError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => ApiError::JobNotFound(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GalleryError> for ApiError {
    fn from(err: GalleryError) -> Self {
        match err {
            GalleryError::NotFound(id) => ApiError::GalleryNotFound(id),
            GalleryError::NotReady(_) => ApiError::NotReady(err.to_string()),
            GalleryError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedImage => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::JobNotFound(_) | Self::GalleryNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady(_) => StatusCode::CONFLICT,
            Self::GalleryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::MissingAsset(e) => {
                tracing::error!(error = %e, "Asset misconfiguration");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
