//! Query handlers for the Overage Purchase context.

use chrono::{DateTime, Utc};
use lumen_billing::{InstallmentSchedule, Money, PricingSettings, installment_options, quote_overage};
use lumen_core::aggregate::AggregateRoot;
use lumen_core::error::DomainError;
use lumen_core::repository::EventRepository;
use lumen_quota::application::command_handlers::load_account;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::command_handlers::load_order;
use crate::domain::status::{OrderStatus, PaymentMethod};

/// Read-only view of a purchase order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    /// The order identifier.
    pub order_id: Uuid,
    /// The event being topped up.
    pub event_id: Uuid,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Requested additional storage in GB.
    pub requested_gb: Decimal,
    /// Requested additional storage in bytes.
    pub additional_bytes: u64,
    /// Price per GB at quote time.
    pub unit_price: Decimal,
    /// Price before interest.
    pub base_price: Money,
    /// Price including interest.
    pub total_price: Money,
    /// Interest charged on top of `base_price`.
    pub interest: Money,
    /// Amount of each installment.
    pub installments: Vec<Money>,
    /// Payment method, once confirmed.
    pub payment_method: Option<PaymentMethod>,
    /// Gateway reference, once issued.
    pub external_ref: Option<String>,
    /// Code shown to the payer.
    pub payment_code: Option<String>,
    /// Last gateway error, while payment could not be issued.
    pub last_payment_error: Option<String>,
    /// When the order was quoted.
    pub created_at: Option<DateTime<Utc>>,
    /// End of the payment window.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the payment settled.
    pub settled_at: Option<DateTime<Utc>>,
    /// When capacity was applied.
    pub applied_at: Option<DateTime<Utc>>,
    /// Stream version.
    pub version: i64,
}

/// Retrieves a purchase order.
///
/// # Errors
///
/// Returns `DomainError::OrderNotFound` if no order exists with the id.
pub async fn get_order(order_id: Uuid, repo: &dyn EventRepository) -> Result<OrderView, DomainError> {
    let order = load_order(order_id, repo).await?;
    let terms = order.terms().cloned().ok_or_else(|| {
        DomainError::Infrastructure(format!("order {order_id} has events but no quote"))
    })?;

    Ok(OrderView {
        order_id,
        event_id: terms.event_id,
        status: order.status(),
        requested_gb: terms.requested_gb,
        additional_bytes: terms.additional_bytes,
        unit_price: terms.unit_price,
        base_price: terms.base_price,
        total_price: terms.total_price,
        interest: terms.total_price - terms.base_price,
        installments: terms.installments,
        payment_method: order.payment_method(),
        external_ref: order.external_ref().map(str::to_owned),
        payment_code: order.payment_code.clone(),
        last_payment_error: order.last_payment_error.clone(),
        created_at: order.created_at,
        expires_at: order.expires_at(),
        settled_at: order.settled_at,
        applied_at: order.applied_at,
        version: order.version(),
    })
}

/// Every installment schedule the organizer can pick for topping up the
/// event by `requested_gb`.
///
/// # Errors
///
/// Returns `DomainError::EventNotFound` or
/// `DomainError::InvalidRequestedStorage` when the amount does not cover the
/// current overage.
pub async fn installment_options_for(
    event_id: Uuid,
    requested_gb: Decimal,
    settings: &PricingSettings,
    repo: &dyn EventRepository,
) -> Result<Vec<InstallmentSchedule>, DomainError> {
    let account = load_account(event_id, repo).await?;
    let base_price = quote_overage(requested_gb, account.minimum_purchase_gb(), settings)?;
    installment_options(base_price, settings)
}
