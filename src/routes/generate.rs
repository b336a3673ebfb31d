use axum::extract::multipart::Field;
use axum::extract::{Multipart, Query, State};
use axum::Json;
use chrono::Local;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::generation::{GenerateFields, GenerateResponse, ProgressQuery, ResetResponse};
use crate::models::job::{Job, JobId, JobInputs};
use crate::models::options::PromptOptions;
use crate::routes::error::ApiError;
use crate::routes::metrics::JOBS_TOTAL;
use crate::services::assets::{BrandAssets, InlineImage};
use crate::services::prompt::build_prompt;
use crate::services::providers::GenerationRequest;

/// Uploads smaller than this are rejected as unreadable.
pub const MIN_UPLOAD_BYTES: usize = 100;

/// POST /generate: accept a photo, create a job and start the provider calls.
pub async fn generate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut primary: Option<Vec<u8>> = None;
    let mut secondary: Option<Vec<u8>> = None;
    let mut fields = GenerateFields {
        num_images: 1,
        ..Default::default()
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => primary = read_file(field).await?,
            "image2" => secondary = read_file(field).await?,
            "frame_color" => fields.frame_color = read_text(field).await?,
            "layout" => fields.layout = read_text(field).await?,
            "color_mode" => fields.color_mode = read_text(field).await?,
            "style" => fields.style = read_text(field).await?,
            "num_images" => {
                if let Some(raw) = read_text(field).await? {
                    fields.num_images = raw.parse().map_err(|_| {
                        ApiError::Validation(format!("num_images must be a number, got {raw:?}"))
                    })?;
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    fields
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let primary = primary
        .ok_or_else(|| ApiError::Validation("Please upload an image.".to_string()))
        .and_then(|bytes| check_image(bytes, state.max_upload_bytes))?;
    let secondary = secondary
        .map(|bytes| check_image(bytes, state.max_upload_bytes))
        .transpose()?;

    let assets = state.assets.load().await?;

    let options = PromptOptions::from_raw(
        fields.frame_color.as_deref(),
        fields.layout.as_deref(),
        fields.color_mode.as_deref(),
        fields.style.as_deref(),
        secondary.is_some(),
    );
    let prompt = build_prompt(&options, Local::now().date_naive());

    let job_id = JobId::generate(&primary.bytes);
    let inputs = JobInputs {
        image_size: primary.bytes.len(),
        image_mime: primary.mime_type.clone(),
        has_secondary: secondary.is_some(),
        options,
        num_images: fields.num_images,
        prompt: prompt.clone(),
    };
    state
        .jobs
        .create(Job::new(
            job_id.clone(),
            inputs,
            state.orchestrator.provider_names(),
        ))
        .await?;

    state.orchestrator.submit(GenerationRequest {
        job_id: job_id.clone(),
        prompt,
        images: reference_images(primary, secondary, assets),
        num_images: fields.num_images,
    });

    metrics::counter!(JOBS_TOTAL).increment(1);
    tracing::info!(job_id = %job_id, "Generation job accepted");

    Ok(Json(GenerateResponse {
        success: true,
        job_id,
        message: "Photo strip generation started".to_string(),
    }))
}

/// POST /reset_on_upload: drop a previous job so a new upload starts clean.
pub async fn reset_on_upload(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Json<ResetResponse> {
    let message = match query.id.filter(|id| !id.is_empty()) {
        Some(id) => {
            let id = JobId::from(id);
            if state.jobs.remove(&id).await {
                tracing::info!(job_id = %id, "Cleared previous job");
                format!("Cleared job {id}")
            } else {
                format!("No job {id} to clear")
            }
        }
        None => "Nothing to clear".to_string(),
    };

    Json(ResetResponse {
        success: true,
        message,
    })
}

/// User photo(s), then logo, then QR code. The prompt refers to the logo by this position.
fn reference_images(
    primary: InlineImage,
    secondary: Option<InlineImage>,
    assets: BrandAssets,
) -> Vec<InlineImage> {
    let mut images = vec![primary];
    images.extend(secondary);
    images.push(assets.logo);
    images.push(assets.qr);
    images
}

fn malformed(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::Validation(format!("Malformed upload: {err}"))
}

/// An empty file part counts as "not provided".
async fn read_file(field: Field<'_>) -> Result<Option<Vec<u8>>, ApiError> {
    let data = field.bytes().await.map_err(malformed)?;
    Ok((!data.is_empty()).then(|| data.to_vec()))
}

async fn read_text(field: Field<'_>) -> Result<Option<String>, ApiError> {
    let text = field.text().await.map_err(malformed)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn check_image(bytes: Vec<u8>, max_bytes: usize) -> Result<InlineImage, ApiError> {
    if bytes.len() > max_bytes {
        return Err(ApiError::TooLarge(max_bytes));
    }
    if bytes.len() < MIN_UPLOAD_BYTES {
        return Err(ApiError::Validation(format!(
            "Uploaded image is too small to read ({} bytes).",
            bytes.len()
        )));
    }
    image::guess_format(&bytes).map_err(|_| ApiError::UnsupportedImage)?;
    Ok(InlineImage::from_bytes(bytes))
}
