use axum::extract::{Query, State};
use axum::Json;

use crate::app_state::AppState;
use crate::models::generation::{ProgressQuery, ProgressResponse};
use crate::models::job::JobId;
use crate::routes::error::ApiError;

/// GET /check_progress?id=: report job status and, once finished, the result images.
///
/// Read-only; repeated calls return the same payload for a terminal job.
pub async fn check_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .map(JobId::from)
        .ok_or_else(|| ApiError::Validation("Missing job id.".to_string()))?;

    let job = state.jobs.get(&id).await?;
    Ok(Json(ProgressResponse::from_job(&job)))
}
