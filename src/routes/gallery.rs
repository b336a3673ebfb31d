use axum::extract::{Path, State};
use axum::Json;

use crate::app_state::AppState;
use crate::models::gallery::{GalleryResponse, SaveGalleryRequest};
use crate::routes::error::ApiError;

/// POST /api/gallery: publish a finished job under a short public id.
pub async fn save_to_gallery(
    State(state): State<AppState>,
    Json(request): Json<SaveGalleryRequest>,
) -> Result<Json<GalleryResponse>, ApiError> {
    let gallery = state.gallery.as_ref().ok_or(ApiError::GalleryUnavailable)?;
    let job = state.jobs.get(&request.job_id).await?;
    Ok(Json(gallery.save(&job).await?))
}

/// GET /api/gallery/{public_id}
pub async fn get_gallery_item(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<Json<GalleryResponse>, ApiError> {
    let gallery = state.gallery.as_ref().ok_or(ApiError::GalleryUnavailable)?;
    Ok(Json(gallery.get(&public_id).await?))
}
