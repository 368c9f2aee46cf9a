//! Routes for the Overage Purchase bounded context.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use lumen_billing::InstallmentSchedule;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use lumen_core::command::Command;
use lumen_purchase::application::command_handlers;
use lumen_purchase::application::query_handlers::{self, OrderView};
use lumen_purchase::domain::commands;
use lumen_purchase::domain::status::PaymentMethod;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /quote.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    /// The event to top up.
    pub event_id: Uuid,
    /// Additional storage in GB, as a decimal string or number.
    pub requested_gb: Decimal,
    /// Number of installments.
    pub installment_count: u32,
}

/// Query string for GET /installment-options.
#[derive(Debug, Deserialize)]
pub struct InstallmentOptionsQuery {
    /// The event to top up.
    pub event_id: Uuid,
    /// Additional storage in GB.
    pub requested_gb: Decimal,
}

/// Request body for POST /{order_id}/confirm.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// `pix` or `credit_card`.
    pub payment_method: PaymentMethod,
}

/// POST /quote
#[instrument(skip(state, request), fields(event_id = %request.event_id))]
async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let command = commands::QuoteOrder {
        correlation_id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        event_id: request.event_id,
        requested_gb: request.requested_gb,
        installment_count: request.installment_count,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    command_handlers::handle_quote_order(
        &command,
        &state.pricing,
        state.clock.as_ref(),
        &*state.event_repository,
        &state.locks,
    )
    .await?;

    let view = query_handlers::get_order(command.order_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// GET /installment-options
#[instrument(skip(state))]
async fn installment_options(
    State(state): State<AppState>,
    Query(query): Query<InstallmentOptionsQuery>,
) -> Result<Json<Vec<InstallmentSchedule>>, ApiError> {
    let options = query_handlers::installment_options_for(
        query.event_id,
        query.requested_gb,
        &state.pricing,
        &*state.event_repository,
    )
    .await?;
    Ok(Json(options))
}

/// POST /{order_id}/confirm
#[instrument(skip(state, request), fields(payment_method = %request.payment_method))]
async fn confirm(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<OrderView>, ApiError> {
    let command = commands::ConfirmOrder {
        correlation_id: Uuid::new_v4(),
        order_id,
        payment_method: request.payment_method,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    command_handlers::handle_confirm_order(
        &command,
        &state.checkout,
        state.clock.as_ref(),
        &state.rng,
        &*state.event_repository,
        &state.locks,
        state.gateway.as_ref(),
    )
    .await?;

    let view = query_handlers::get_order(order_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// POST /{order_id}/cancel
#[instrument(skip(state))]
async fn cancel(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    let command = commands::CancelOrder {
        correlation_id: Uuid::new_v4(),
        order_id,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    command_handlers::handle_cancel_order(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &state.locks,
    )
    .await?;

    let view = query_handlers::get_order(order_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// GET /{order_id}
#[instrument(skip(state))]
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    let view = query_handlers::get_order(order_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// Returns the router for the purchase context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quote", post(quote))
        .route("/installment-options", get(installment_options))
        .route("/{order_id}", get(get_order))
        .route("/{order_id}/confirm", post(confirm))
        .route("/{order_id}/cancel", post(cancel))
}
