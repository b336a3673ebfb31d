use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::JobId;

/// A persisted gallery entry, addressable by a short public id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GalleryItem {
    pub public_id: String,
    pub job_id: String,
    pub image_urls: sqlx::types::Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SaveGalleryRequest {
    pub job_id: JobId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GalleryResponse {
    pub success: bool,
    pub public_id: String,
    pub view_url: String,
    pub image_urls: Vec<String>,
    pub expires_at: DateTime<Utc>,
}
