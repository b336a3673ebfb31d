use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Names of every metric the service records.
pub const JOBS_TOTAL: &str = "generation_jobs_total";
pub const JOBS_STARTED: &str = "generation_jobs_started";
pub const JOBS_SUCCEEDED: &str = "generation_jobs_succeeded";
pub const JOBS_FAILED: &str = "generation_jobs_failed";
pub const PROCESSING_SECONDS: &str = "generation_processing_seconds";
pub const PROVIDER_CALLS_FAILED: &str = "provider_calls_failed";

/// Register descriptions with the installed recorder.
pub fn describe() {
    metrics::describe_counter!(JOBS_TOTAL, "Total generation jobs submitted");
    metrics::describe_counter!(JOBS_STARTED, "Generation jobs picked up by the orchestrator");
    metrics::describe_counter!(JOBS_SUCCEEDED, "Generation jobs that produced images");
    metrics::describe_counter!(JOBS_FAILED, "Generation jobs that failed");
    metrics::describe_histogram!(
        PROCESSING_SECONDS,
        "Wall time from job start to final status"
    );
    metrics::describe_counter!(PROVIDER_CALLS_FAILED, "Failed provider calls, by provider");
}

/// Prometheus metrics scrape endpoint.
/// Returns metrics in Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
