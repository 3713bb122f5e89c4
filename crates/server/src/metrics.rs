//! Prometheus metrics
//!
//! Recorded through the `metrics` facade and rendered by the Prometheus
//! exporter at `/metrics`.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use farmhand_persistence::QueuePassReport;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

const TURNS_TOTAL: &str = "farmhand_turns_total";
const TURN_DURATION_SECONDS: &str = "farmhand_turn_duration_seconds";
const QUEUE_DEPTH: &str = "farmhand_retry_queue_depth";
const QUEUE_PASSES_TOTAL: &str = "farmhand_retry_queue_passes_total";
const QUEUE_ENTRIES_TOTAL: &str = "farmhand_retry_queue_entries_total";

/// Install the global Prometheus recorder.
///
/// Returns `None` if a recorder is already installed.
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    }
}

/// One finished turn, labelled by outcome kind
pub fn record_turn(kind: &'static str, elapsed: Duration) {
    metrics::counter!(TURNS_TOTAL, "outcome" => kind).increment(1);
    metrics::histogram!(TURN_DURATION_SECONDS, "outcome" => kind).record(elapsed.as_secs_f64());
}

pub fn record_queue_depth(depth: usize) {
    metrics::gauge!(QUEUE_DEPTH).set(depth as f64);
}

pub fn record_queue_pass(report: &QueuePassReport) {
    let status = match report.status {
        farmhand_persistence::QueuePassStatus::Completed => "completed",
        farmhand_persistence::QueuePassStatus::Offline => "offline",
        farmhand_persistence::QueuePassStatus::AlreadyRunning => "already_running",
    };
    metrics::counter!(QUEUE_PASSES_TOTAL, "status" => status).increment(1);
    metrics::counter!(QUEUE_ENTRIES_TOTAL, "result" => "succeeded").increment(report.succeeded as u64);
    metrics::counter!(QUEUE_ENTRIES_TOTAL, "result" => "retried").increment(report.retried as u64);
    metrics::counter!(QUEUE_ENTRIES_TOTAL, "result" => "dropped").increment(report.dropped as u64);
    record_queue_depth(report.remaining);
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
