//! Liveness and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

/// Liveness response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Readiness response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// `ready` or `unavailable`.
    pub status: &'static str,
    /// `connected` or the store error.
    pub event_store: String,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health/ready
///
/// Reads an empty stream to prove the event store answers.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.event_repository.load_events(Uuid::nil()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                event_store: "connected".to_owned(),
            }),
        ),
        Err(err) => {
            warn!(error = %err, "event store not reachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "unavailable",
                    event_store: err.to_string(),
                }),
            )
        }
    }
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness))
}
