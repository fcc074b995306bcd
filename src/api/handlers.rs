//! HTTP request handlers
//!
//! Thin boundary layer: authenticate, classify, hand off to the
//! orchestrator, and map its outcome to a response code so upstream
//! monitoring can distinguish "nothing happened" from "remediation in
//! flight" from "needs a human".

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::classifier::ClassifierStrategy;
use crate::config::AppConfig;
use crate::orchestrator::RecoveryOrchestrator;
use crate::store::StateStore;
use crate::types::EventOutcome;

use super::auth;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ControllerState {
    pub orchestrator: Arc<RecoveryOrchestrator>,
    pub store: Arc<StateStore>,
    pub classifier: Arc<dyn ClassifierStrategy>,
    pub config: Arc<AppConfig>,
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "Unauthorized"})),
    )
        .into_response()
}

/// POST /autoheal-event — the main event intake.
pub async fn handle_autoheal_event(
    State(state): State<ControllerState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    if !auth::verify_request(&state.config, &headers, peer) {
        warn!(?peer, "Rejected unauthenticated event");
        return unauthorized();
    }

    let event = match state.classifier.classify(&payload) {
        Ok(event) => event,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    match state.orchestrator.handle_event(&event).await {
        EventOutcome::Ignored { reason } => (
            StatusCode::OK,
            Json(json!({"status": "ignored", "reason": reason})),
        )
            .into_response(),
        EventOutcome::PausedAck => {
            (StatusCode::OK, Json(json!({"status": "paused"}))).into_response()
        }
        EventOutcome::PausedAfterFailedRecovery => (
            StatusCode::OK,
            Json(json!({"status": "paused_after_failed_recovery"})),
        )
            .into_response(),
        EventOutcome::Counted { current, threshold } => (
            StatusCode::OK,
            Json(json!({"status": "counted", "current": current, "threshold": threshold})),
        )
            .into_response(),
        EventOutcome::RecoveryInitiated => (
            StatusCode::OK,
            Json(json!({"status": "recovery_initiated"})),
        )
            .into_response(),
        EventOutcome::RecoveryFailed { reason } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "recovery_failed", "message": reason})),
        )
            .into_response(),
    }
}

/// POST /reset — clear pause/failure state (admin).
/// Body `{"service_name": "..."}` is optional; defaults to the critical
/// service. Idempotent.
pub async fn reset_state(
    State(state): State<ControllerState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Option<Json<Value>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    if !auth::verify_request(&state.config, &headers, peer) {
        return unauthorized();
    }

    let service = payload
        .as_ref()
        .and_then(|Json(v)| v.get("service_name"))
        .and_then(Value::as_str)
        .unwrap_or(state.config.critical_service.as_str())
        .to_string();

    state.orchestrator.reset(&service).await;

    (
        StatusCode::OK,
        Json(json!({"status": "reset", "service": service})),
    )
        .into_response()
}

/// GET /status — full state snapshot plus effective policy.
pub async fn get_status(State(state): State<ControllerState>) -> Response {
    let snapshot = state.store.snapshot().await;
    (
        StatusCode::OK,
        Json(json!({
            "state": snapshot,
            "critical_service": state.config.critical_service,
            "threshold": state.config.fail_threshold,
            "quiet_period_secs": state.config.quiet_period.as_secs(),
        })),
    )
        .into_response()
}

/// GET /health — liveness probe, independent of business state.
pub async fn health_check(State(state): State<ControllerState>) -> Response {
    let services_tracked = state.store.read(|doc| doc.services.len()).await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "autoheal-controller",
            "timestamp": Utc::now().to_rfc3339(),
            "services_tracked": services_tracked,
        })),
    )
        .into_response()
}
