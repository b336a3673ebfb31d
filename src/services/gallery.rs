use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::models::gallery::{GalleryItem, GalleryResponse};
use crate::models::job::{Job, JobStatus};

/// Persists finished jobs under short public ids for the shareable result page.
pub struct GalleryStore {
    pool: PgPool,
    ttl: Duration,
    public_base_url: Option<String>,
}

impl GalleryStore {
    pub fn new(pool: PgPool, ttl_hours: i64, public_base_url: Option<String>) -> Self {
        Self {
            pool,
            ttl: Duration::hours(ttl_hours.max(1)),
            public_base_url: public_base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn save(&self, job: &Job) -> Result<GalleryResponse, GalleryError> {
        if job.status != JobStatus::Succeeded {
            return Err(GalleryError::NotReady(job.status.to_string()));
        }

        let image_urls: Vec<String> = job
            .results
            .iter()
            .map(|image| {
                if image.source.starts_with("http") {
                    image.source.clone()
                } else {
                    image.data_uri()
                }
            })
            .collect();

        let public_id = short_id();
        let expires_at = Utc::now() + self.ttl;
        let item = queries::insert_gallery_item(
            &self.pool,
            &public_id,
            job.id.as_str(),
            &image_urls,
            expires_at,
        )
        .await?;

        tracing::info!(
            job_id = %job.id,
            public_id = %item.public_id,
            images = image_urls.len(),
            "Saved gallery item"
        );

        Ok(self.response(item))
    }

    pub async fn get(&self, public_id: &str) -> Result<GalleryResponse, GalleryError> {
        queries::get_gallery_item(&self.pool, public_id)
            .await?
            .map(|item| self.response(item))
            .ok_or_else(|| GalleryError::NotFound(public_id.to_string()))
    }

    pub async fn cleanup_expired(&self) -> Result<u64, GalleryError> {
        let removed = queries::delete_expired_items(&self.pool).await?;
        if removed > 0 {
            tracing::info!(removed, "Deleted expired gallery items");
        }
        Ok(removed)
    }

    fn response(&self, item: GalleryItem) -> GalleryResponse {
        GalleryResponse {
            success: true,
            view_url: view_url(self.public_base_url.as_deref(), &item.public_id),
            public_id: item.public_id,
            image_urls: item.image_urls.0,
            expires_at: item.expires_at,
        }
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn view_url(base: Option<&str>, public_id: &str) -> String {
    match base {
        Some(base) => format!("{base}/api/gallery/{public_id}"),
        None => format!("/api/gallery/{public_id}"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("Gallery item {0} not found or expired")]
    NotFound(String),

    #[error("Job is {0}; only finished jobs can be saved")]
    NotReady(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
