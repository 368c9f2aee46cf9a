//! Routes for the Storage & Quota bounded context.

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use lumen_core::command::Command;
use lumen_quota::application::command_handlers::{self, RecordedUpload};
use lumen_quota::application::query_handlers::{self, ObjectView, QuotaView, UsageCheck};
use lumen_quota::domain::commands;
use lumen_quota::domain::objects::MediaCategory;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    /// The event to open a storage account for.
    pub event_id: Uuid,
    /// The plan the event subscribes to.
    pub plan_id: String,
}

/// Request body for PUT /{event_id}/plan.
#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    /// The new plan.
    pub plan_id: String,
}

/// Request body for POST /{event_id}/objects.
#[derive(Debug, Deserialize)]
pub struct RecordObjectRequest {
    /// Identifier of the uploaded object.
    pub object_id: Uuid,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// Image or video.
    pub category: MediaCategory,
    /// Upload time; defaults to now.
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The aggregate the command acted on.
    pub aggregate_id: Uuid,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// POST /
#[instrument(skip(state, request), fields(event_id = %request.event_id))]
async fn open_account(
    State(state): State<AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::OpenAccount {
        correlation_id: Uuid::new_v4(),
        event_id: request.event_id,
        plan_id: request.plan_id,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let stored_events = command_handlers::handle_open_account(
        &command,
        state.catalog.as_ref(),
        state.clock.as_ref(),
        &*state.event_repository,
        &state.locks,
    )
    .await?;

    Ok(Json(CommandResponse {
        aggregate_id: command.event_id,
        event_ids: stored_events.iter().map(|e| e.event_id).collect(),
    }))
}

/// PUT /{event_id}/plan
#[instrument(skip(state, request))]
async fn change_plan(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<ChangePlanRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ChangePlan {
        correlation_id: Uuid::new_v4(),
        event_id,
        plan_id: request.plan_id,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let stored_events = command_handlers::handle_change_plan(
        &command,
        state.catalog.as_ref(),
        state.clock.as_ref(),
        &*state.event_repository,
        &state.locks,
    )
    .await?;

    Ok(Json(CommandResponse {
        aggregate_id: event_id,
        event_ids: stored_events.iter().map(|e| e.event_id).collect(),
    }))
}

/// POST /{event_id}/objects
#[instrument(skip(state, request), fields(object_id = %request.object_id))]
async fn record_object(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<RecordObjectRequest>,
) -> Result<Json<RecordedUpload>, ApiError> {
    let command = commands::RecordObject {
        correlation_id: Uuid::new_v4(),
        event_id,
        object_id: request.object_id,
        size_bytes: request.size_bytes,
        category: request.category,
        uploaded_at: request.uploaded_at,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let upload = command_handlers::handle_record_object(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &state.locks,
    )
    .await?;

    Ok(Json(upload))
}

/// GET /{event_id}/quota
#[instrument(skip(state))]
async fn get_quota(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<QuotaView>, ApiError> {
    let view = query_handlers::get_quota(event_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// GET /{event_id}/objects
#[instrument(skip(state))]
async fn list_objects(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<ObjectView>>, ApiError> {
    let objects = query_handlers::list_objects(event_id, &*state.event_repository).await?;
    Ok(Json(objects))
}

/// GET /{event_id}/usage-check
#[instrument(skip(state))]
async fn verify_usage(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<UsageCheck>, ApiError> {
    let check = query_handlers::verify_usage(event_id, &*state.event_repository).await?;
    Ok(Json(check))
}

/// Returns the router for the quota context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(open_account))
        .route("/{event_id}/plan", put(change_plan))
        .route("/{event_id}/objects", post(record_object).get(list_objects))
        .route("/{event_id}/quota", get(get_quota))
        .route("/{event_id}/usage-check", get(verify_usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lumen_billing::PricingSettings;
    use lumen_core::clock::Clock;
    use lumen_core::repository::EventRepository;
    use lumen_purchase::application::command_handlers::CheckoutSettings;
    use lumen_purchase::gateway::SandboxPaymentGateway;
    use lumen_quota::domain::plans::InMemoryPlanCatalog;
    use lumen_test_support::{
        EmptyEventRepository, FailingEventRepository, FixedClock, InMemoryEventRepository,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_state_with(event_repository: Arc<dyn EventRepository>) -> AppState {
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(FixedClock(Utc::now()));
        AppState::new(
            event_repository,
            Arc::new(InMemoryPlanCatalog::with_defaults()),
            Arc::new(SandboxPaymentGateway::new()),
            PricingSettings::default(),
            CheckoutSettings::default(),
        )
        .with_clock(clock)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => builder.body(Body::from(serde_json::to_vec(&json).unwrap())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_open_account_returns_200_with_event_ids() {
        // Arrange
        let app = router().with_state(app_state_with(Arc::new(EmptyEventRepository)));
        let event_id = Uuid::new_v4();

        // Act
        let (status, json) = send(
            app,
            "POST",
            "/",
            Some(serde_json::json!({ "event_id": event_id, "plan_id": "basic" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["aggregate_id"], event_id.to_string());
        assert_eq!(json["event_ids"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_account_with_unknown_plan_returns_404() {
        let app = router().with_state(app_state_with(Arc::new(EmptyEventRepository)));

        let (status, json) = send(
            app,
            "POST",
            "/",
            Some(serde_json::json!({ "event_id": Uuid::new_v4(), "plan_id": "gold" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "plan_not_found");
    }

    #[tokio::test]
    async fn test_open_account_returns_500_on_repository_failure() {
        let app = router().with_state(app_state_with(Arc::new(FailingEventRepository)));

        let (status, json) = send(
            app,
            "POST",
            "/",
            Some(serde_json::json!({ "event_id": Uuid::new_v4(), "plan_id": "basic" })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "infrastructure_error");
    }

    #[tokio::test]
    async fn test_quota_for_unknown_event_returns_404() {
        let app = router().with_state(app_state_with(Arc::new(EmptyEventRepository)));

        let (status, json) = send(app, "GET", &format!("/{}/quota", Uuid::new_v4()), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "event_not_found");
    }

    #[tokio::test]
    async fn test_upload_over_quota_is_reported_locked() {
        // Arrange
        let state = app_state_with(Arc::new(InMemoryEventRepository::new()));
        let event_id = Uuid::new_v4();
        send(
            router().with_state(state.clone()),
            "POST",
            "/",
            Some(serde_json::json!({ "event_id": event_id, "plan_id": "basic" })),
        )
        .await;

        // Act
        let (status, json) = send(
            router().with_state(state.clone()),
            "POST",
            &format!("/{event_id}/objects"),
            Some(serde_json::json!({
                "object_id": Uuid::new_v4(),
                "size_bytes": 11_u64 << 30,
                "category": "video",
            })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["locked"], true);
        let (_, quota) = send(
            router().with_state(state),
            "GET",
            &format!("/{event_id}/quota"),
            None,
        )
        .await;
        assert_eq!(quota["minimum_purchase_gb"], 1);
        assert_eq!(quota["locked_object_ids"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_byte_upload_returns_400() {
        let state = app_state_with(Arc::new(InMemoryEventRepository::new()));
        let event_id = Uuid::new_v4();
        send(
            router().with_state(state.clone()),
            "POST",
            "/",
            Some(serde_json::json!({ "event_id": event_id, "plan_id": "basic" })),
        )
        .await;

        let (status, json) = send(
            router().with_state(state),
            "POST",
            &format!("/{event_id}/objects"),
            Some(serde_json::json!({
                "object_id": Uuid::new_v4(),
                "size_bytes": 0,
                "category": "image",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }
}
