use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::gallery::GalleryItem;

/// Insert a new gallery item
pub async fn insert_gallery_item(
    pool: &PgPool,
    public_id: &str,
    job_id: &str,
    image_urls: &[String],
    expires_at: DateTime<Utc>,
) -> Result<GalleryItem, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>(
        r#"
        INSERT INTO gallery_items (public_id, job_id, image_urls, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING public_id, job_id, image_urls, created_at, expires_at
        "#,
    )
    .bind(public_id)
    .bind(job_id)
    .bind(Json(image_urls))
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

/// Get a gallery item by public id, ignoring expired rows
pub async fn get_gallery_item(
    pool: &PgPool,
    public_id: &str,
) -> Result<Option<GalleryItem>, sqlx::Error> {
    sqlx::query_as::<_, GalleryItem>(
        r#"
        SELECT public_id, job_id, image_urls, created_at, expires_at
        FROM gallery_items
        WHERE public_id = $1 AND expires_at > NOW()
        "#,
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await
}

/// Delete expired gallery items, returning how many were removed
pub async fn delete_expired_items(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM gallery_items WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Connectivity probe for health checks
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
