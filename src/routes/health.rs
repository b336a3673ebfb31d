use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::db::queries;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: Vec<&'static str>,
    pub active_jobs: usize,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub assets: ComponentHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ComponentHealth>,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            latency_ms: Some(latency_ms),
        }
    }

    fn error() -> Self {
        Self {
            status: "error".to_string(),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET /health: brand assets, optional gallery database, in-flight job count.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();
    let assets_check = match state.assets.check().await {
        Ok(()) => ComponentHealth::ok(start.elapsed().as_millis() as u64),
        Err(e) => {
            tracing::warn!(error = %e, "Asset health check failed");
            ComponentHealth::error()
        }
    };

    let db_check = match &state.gallery {
        Some(gallery) => {
            let db_start = std::time::Instant::now();
            Some(match queries::ping(gallery.pool()).await {
                Ok(()) => ComponentHealth::ok(db_start.elapsed().as_millis() as u64),
                Err(e) => {
                    tracing::warn!(error = %e, "Database health check failed");
                    ComponentHealth::error()
                }
            })
        }
        None => None,
    };

    let all_healthy = assets_check.is_ok() && db_check.as_ref().map_or(true, ComponentHealth::is_ok);
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state.orchestrator.provider_names(),
        active_jobs: state.jobs.len().await,
        checks: HealthChecks {
            assets: assets_check,
            database: db_check,
        },
    };

    (status_code, Json(response))
}
