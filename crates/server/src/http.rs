//! HTTP Endpoints
//!
//! REST API for conversations, user corrections and the retry queue.

use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use farmhand_agent::Thresholds;
use farmhand_core::{
    ConversationId, DomainSnapshot, ExecutionContext, QueuedAction, SlotName, TurnOutcome,
    Utterance,
};
use farmhand_persistence::QueuePassReport;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::metrics::{metrics_handler, record_queue_depth, record_queue_pass, record_turn};
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout = Duration::from_secs(server.timeout_seconds);

    Router::new()
        // Conversations
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/conversations/:id", delete(delete_conversation))
        .route("/api/conversations/:id/messages", post(send_message))
        .route("/api/conversations/:id/confirm", post(confirm_action))
        .route("/api/conversations/:id/corrections", post(record_correction))
        // Retry queue
        .route("/api/queue", get(queue_status))
        .route("/api/queue/process", post(process_queue))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

fn localhost_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(HeaderValue::from_static(DEFAULT_ORIGIN))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

/// Build the CORS layer from configured origins.
///
/// Disabled CORS is permissive. No valid origin falls back to localhost:3000.
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to {}", DEFAULT_ORIGIN);
        return localhost_cors();
    }

    tracing::info!("CORS configured with {} origins", parsed.len());
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

/// Who is speaking, shared by the conversation endpoints
#[derive(Debug, Deserialize)]
struct Caller {
    tenant_id: String,
    user_id: String,
    /// Defaults to today (UTC)
    #[serde(default)]
    current_date: Option<NaiveDate>,
    #[serde(default)]
    snapshot: Option<DomainSnapshot>,
}

impl Caller {
    fn into_context(self) -> Result<ExecutionContext, ServerError> {
        if self.tenant_id.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(ServerError::InvalidRequest(
                "tenant_id and user_id are required".to_string(),
            ));
        }
        let date = self.current_date.unwrap_or_else(|| Utc::now().date_naive());
        Ok(ExecutionContext::new(self.tenant_id, self.user_id, date)
            .with_snapshot(self.snapshot.unwrap_or_default()))
    }
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    text: String,
    #[serde(flatten)]
    caller: Caller,
}

/// Run one turn of a conversation, creating it on first contact
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<TurnOutcome>, ServerError> {
    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Err(ServerError::InvalidRequest("text must not be empty".to_string()));
    }
    let ctx = request.caller.into_context()?;

    let entry = state.sessions.get_or_create(&id)?;
    let start = Instant::now();
    let outcome = {
        let mut session = entry.session.lock().await;
        let utterance = Utterance::new(ConversationId::from(id.as_str()), text);
        session.handle_utterance(&utterance, &ctx).await
    };
    entry.touch();

    record_turn(outcome.kind(), start.elapsed());
    if matches!(outcome, TurnOutcome::Queued(_)) {
        record_queue_depth(state.retry_queue().len().await);
    }

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    action_id: Uuid,
    accepted: bool,
    #[serde(flatten)]
    caller: Caller,
}

/// Answer a pending confirmation by action id
async fn confirm_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<TurnOutcome>, ServerError> {
    let ctx = request.caller.into_context()?;
    let entry = state
        .sessions
        .get(&id)
        .ok_or_else(|| ServerError::Conflict(format!("No conversation {}", id)))?;

    let start = Instant::now();
    let outcome = {
        let mut session = entry.session.lock().await;
        session.confirm(request.action_id, request.accepted, &ctx).await?
    };
    entry.touch();
    record_turn(outcome.kind(), start.elapsed());

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct CorrectionRequest {
    user_id: String,
    original: String,
    corrected: String,
    #[serde(default)]
    slot: Option<String>,
}

#[derive(Debug, Serialize)]
struct CorrectionResponse {
    tightened: bool,
    thresholds: Thresholds,
}

/// Record that the user corrected something the assistant inferred
async fn record_correction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CorrectionRequest>,
) -> Result<Json<CorrectionResponse>, ServerError> {
    if request.user_id.trim().is_empty() {
        return Err(ServerError::InvalidRequest("user_id is required".to_string()));
    }
    let slot = match request.slot.as_deref() {
        Some(name) => Some(
            SlotName::parse(name)
                .ok_or_else(|| ServerError::InvalidRequest(format!("Unknown slot: {}", name)))?,
        ),
        None => None,
    };

    let entry = state.sessions.get_or_create(&id)?;
    let mut session = entry.session.lock().await;
    let tightened = session
        .record_correction(
            &request.user_id,
            &request.original,
            &request.corrected,
            slot,
            Utc::now(),
        )
        .await?;

    if tightened {
        tracing::info!(conversation = %id, user = %request.user_id, "Confirmation thresholds tightened");
    }

    Ok(Json(CorrectionResponse {
        tightened,
        thresholds: session.gate().thresholds(),
    }))
}

/// Get conversation info
async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let entry = state.sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let session = entry.session.lock().await;

    Ok(Json(serde_json::json!({
        "id": id,
        "turn_count": session.context().turn_count(),
        "idle_seconds": entry.idle_for().as_secs(),
        "pending_confirmation": session.pending_confirmation(),
        "pending_clarification": session.has_pending_clarification(),
        "thresholds": session.gate().thresholds(),
    })))
}

async fn delete_conversation(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.sessions.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, Serialize)]
struct QueueStatus {
    len: usize,
    capacity: usize,
    processing: bool,
    entries: Vec<QueuedAction>,
}

async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    let queue = state.retry_queue();
    let entries = queue.entries().await;
    Json(QueueStatus {
        len: entries.len(),
        capacity: queue.capacity(),
        processing: queue.is_processing(),
        entries,
    })
}

/// Run one retry pass now instead of waiting for the background interval
async fn process_queue(State(state): State<AppState>) -> Json<QueuePassReport> {
    let report = state
        .retry_queue()
        .process_queue(state.services.executor.as_ref(), state.probe.as_ref())
        .await;
    record_queue_pass(&report);
    Json(report)
}

/// Health check.
///
/// An unreachable executor only degrades the service, since turns are
/// queued while offline.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let executor_online = state.probe.is_online().await;
    let queue = state.retry_queue();
    let queue_len = queue.len().await;

    let mut checks = serde_json::Map::new();
    checks.insert(
        "executor".to_string(),
        serde_json::json!({
            "status": if executor_online { "ok" } else { "offline" },
            "endpoint": state.config.executor.endpoint.clone(),
        }),
    );
    checks.insert(
        "retry_queue".to_string(),
        serde_json::json!({
            "status": if queue_len < queue.capacity() { "ok" } else { "full" },
            "len": queue_len,
            "capacity": queue.capacity(),
        }),
    );
    checks.insert(
        "semantic".to_string(),
        serde_json::json!({
            "status": if state.services.classifier.is_available() { "ok" } else { "disabled" },
        }),
    );
    checks.insert(
        "sessions".to_string(),
        serde_json::json!({
            "status": "ok",
            "count": state.sessions.count(),
            "max": state.sessions.max_sessions(),
        }),
    );

    let status = if executor_online { "healthy" } else { "degraded" };

    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "checks": checks,
    }))
}
