//! Health, liveness, and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Overall health, 503 once shutdown has started
//! - `GET /health/live` - Liveness probe, always 200
//! - `GET /health/ready` - Readiness probe, 503 once shutdown has started
//!
//! # Liveness vs Readiness
//!
//! - **Liveness**: the process is up. Never affected by shutdown, so an
//!   orchestrator does not kill a pod that is draining.
//! - **Readiness**: the process should receive new traffic. Flips to
//!   not-ready as soon as shutdown begins.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::models::{HealthResponse, LivenessResponse, ReadinessResponse, SHUTTING_DOWN};
use crate::state::{AppState, Lifecycle};

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// { "ok": true, "timestamp": "2024-01-15T10:30:00Z" }
/// ```
///
/// While shutting down (503):
///
/// ```json
/// { "ok": false, "status": "shutting down", "timestamp": "2024-01-15T10:30:00Z" }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let now = Utc::now();

    match state.shutdown.lifecycle() {
        Lifecycle::Running => (StatusCode::OK, Json(HealthResponse::running(now))),
        Lifecycle::ShuttingDown => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::shutting_down(now)),
        ),
    }
}

/// Liveness probe.
pub async fn liveness_check() -> Json<LivenessResponse> {
    Json(LivenessResponse { alive: true })
}

/// Readiness check endpoint for Kubernetes probes.
///
/// # Usage
///
/// ```yaml
/// readinessProbe:
///   httpGet:
///     path: /health/ready
///     port: 3000
///   periodSeconds: 5
/// ```
#[instrument(skip(state))]
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match state.shutdown.lifecycle() {
        Lifecycle::Running => (
            StatusCode::OK,
            Json(ReadinessResponse {
                ready: true,
                reason: None,
            }),
        ),
        Lifecycle::ShuttingDown => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                reason: Some(SHUTTING_DOWN.to_string()),
            }),
        ),
    }
}
