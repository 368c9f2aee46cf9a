//! Lumen — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lumen_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The schema could not be migrated.
    #[error("migration error: {0}")]
    Migration(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            DomainError::EventNotFound(_) => (StatusCode::NOT_FOUND, "event_not_found"),
            DomainError::PlanNotFound(_) => (StatusCode::NOT_FOUND, "plan_not_found"),
            DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
            DomainError::InvalidRequestedStorage { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_requested_storage")
            }
            DomainError::InvalidInstallmentCount { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_installment_count")
            }
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::PaymentGateway(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "payment_pending_try_again")
            }
            DomainError::DuplicateSettlement(_) => (StatusCode::OK, "duplicate_settlement"),
            DomainError::StateConflict { .. } => (StatusCode::CONFLICT, "state_conflict"),
            DomainError::ConcurrencyConflict { .. } => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
