//! Payment gateway notifications.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use lumen_core::command::Command;
use lumen_purchase::application::command_handlers::{self, SettlementOutcome};
use lumen_purchase::domain::commands;

use crate::error::ApiError;
use crate::state::AppState;
use crate::worker;

/// Settlement notification sent by the gateway.
#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    /// The settled order.
    pub order_id: Uuid,
    /// The gateway's payment reference.
    pub external_ref: String,
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Serialize)]
pub struct NotificationAck {
    /// The order the notification referred to.
    pub order_id: Uuid,
    /// `applied`, `duplicate` or `paid_pending_application`.
    pub status: &'static str,
}

/// POST /payments
///
/// Duplicate deliveries are acknowledged with 200 so the gateway stops
/// redelivering them.
#[instrument(skip(state, notification), fields(order_id = %notification.order_id))]
async fn payment_settled(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<NotificationAck>, ApiError> {
    let command = commands::SettlePayment {
        correlation_id: Uuid::new_v4(),
        order_id: notification.order_id,
        external_ref: notification.external_ref,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let outcome = command_handlers::handle_settle_payment(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &state.locks,
    )
    .await?;

    let status = match outcome {
        SettlementOutcome::Applied => "applied",
        SettlementOutcome::Duplicate => "duplicate",
        SettlementOutcome::PaidPendingApplication => {
            warn!("capacity not applied yet; scheduling retry");
            worker::spawn_apply_retry(state.clone(), command.order_id);
            "paid_pending_application"
        }
    };

    Ok(Json(NotificationAck {
        order_id: command.order_id,
        status,
    }))
}

/// Returns the router for gateway notifications.
pub fn router() -> Router<AppState> {
    Router::new().route("/payments", post(payment_settled))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lumen_billing::PricingSettings;
    use lumen_core::repository::EventRepository;
    use lumen_purchase::application::command_handlers::CheckoutSettings;
    use lumen_purchase::gateway::SandboxPaymentGateway;
    use lumen_quota::domain::plans::InMemoryPlanCatalog;
    use lumen_test_support::{EmptyEventRepository, FailingEventRepository};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_with(event_repository: Arc<dyn EventRepository>) -> Router {
        router().with_state(AppState::new(
            event_repository,
            Arc::new(InMemoryPlanCatalog::with_defaults()),
            Arc::new(SandboxPaymentGateway::new()),
            PricingSettings::default(),
            CheckoutSettings::default(),
        ))
    }

    async fn notify(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/payments")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body_bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_notification_for_unknown_order_returns_404() {
        let (status, json) = notify(
            app_with(Arc::new(EmptyEventRepository)),
            serde_json::json!({ "order_id": Uuid::new_v4(), "external_ref": "ref-1" }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "order_not_found");
    }

    #[tokio::test]
    async fn test_notification_returns_500_on_repository_failure() {
        let (status, json) = notify(
            app_with(Arc::new(FailingEventRepository)),
            serde_json::json!({ "order_id": Uuid::new_v4(), "external_ref": "ref-1" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "infrastructure_error");
    }

    #[tokio::test]
    async fn test_malformed_notification_is_rejected() {
        let (status, _) = notify(
            app_with(Arc::new(EmptyEventRepository)),
            serde_json::json!({ "external_ref": "ref-1" }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
