//! Domain events for the Overage Purchase context.

use chrono::{DateTime, Utc};
use lumen_billing::Money;
use lumen_core::event::{DomainEvent, EventMetadata};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::PaymentMethod;

/// Event type of [`OrderQuoted`].
pub const ORDER_QUOTED: &str = "purchase.order_quoted";
/// Event type of [`PaymentRequested`]. Every order that ever waited for
/// payment carries one, which is what the expiry sweep searches for.
pub const PAYMENT_REQUESTED: &str = "purchase.payment_requested";
/// Event type of [`PaymentIssued`].
pub const PAYMENT_ISSUED: &str = "purchase.payment_issued";
/// Event type of [`PaymentFailed`].
pub const PAYMENT_FAILED: &str = "purchase.payment_failed";
/// Event type of [`PaymentSettled`].
pub const PAYMENT_SETTLED: &str = "purchase.payment_settled";
/// Event type of [`CapacityApplied`].
pub const CAPACITY_APPLIED: &str = "purchase.capacity_applied";
/// Event type of [`OrderCancelled`].
pub const ORDER_CANCELLED: &str = "purchase.order_cancelled";
/// Event type of [`OrderExpired`].
pub const ORDER_EXPIRED: &str = "purchase.order_expired";

/// Emitted when a draft order is priced. Everything in it is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderQuoted {
    /// The order identifier.
    pub order_id: Uuid,
    /// The event being topped up.
    pub event_id: Uuid,
    /// Requested additional storage in GB.
    pub requested_gb: Decimal,
    /// `requested_gb` in whole bytes.
    pub additional_bytes: u64,
    /// Price per GB at quote time.
    pub unit_price: Decimal,
    /// Price before interest.
    pub base_price: Money,
    /// Price including interest.
    pub total_price: Money,
    /// Number of installments.
    pub installment_count: u32,
    /// Amount of each installment; sums to `total_price`.
    pub installments: Vec<Money>,
}

/// Emitted when the organizer confirms the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequested {
    /// The order identifier.
    pub order_id: Uuid,
    /// Chosen payment method.
    pub payment_method: PaymentMethod,
    /// Key that de-duplicates gateway calls for this order.
    pub idempotency_key: String,
    /// When an unpaid order expires.
    pub expires_at: DateTime<Utc>,
}

/// Emitted when the gateway accepted the payment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIssued {
    /// The order identifier.
    pub order_id: Uuid,
    /// The gateway's reference for the payment.
    pub external_ref: String,
    /// Code the payer uses (pix copy-paste code, card checkout token).
    pub payment_code: String,
}

/// Emitted when every gateway attempt failed. The order stays pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailed {
    /// The order identifier.
    pub order_id: Uuid,
    /// Last gateway error.
    pub reason: String,
}

/// Emitted when the gateway reports the payment as settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettled {
    /// The order identifier.
    pub order_id: Uuid,
    /// The gateway's reference for the payment.
    pub external_ref: String,
}

/// Emitted once the event's capacity has been expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityApplied {
    /// The order identifier.
    pub order_id: Uuid,
    /// The event that was expanded.
    pub event_id: Uuid,
    /// Bytes added.
    pub additional_bytes: u64,
}

/// Emitted when an unpaid order is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelled {
    /// The order identifier.
    pub order_id: Uuid,
}

/// Emitted when the payment window of a pending order elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderExpired {
    /// The order identifier.
    pub order_id: Uuid,
}

/// Event payload variants for the Overage Purchase context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PurchaseEventKind {
    /// A draft order was priced.
    OrderQuoted(OrderQuoted),
    /// The order was confirmed for payment.
    PaymentRequested(PaymentRequested),
    /// The gateway accepted the payment request.
    PaymentIssued(PaymentIssued),
    /// The gateway could not be reached.
    PaymentFailed(PaymentFailed),
    /// The payment settled.
    PaymentSettled(PaymentSettled),
    /// Capacity was applied to the event.
    CapacityApplied(CapacityApplied),
    /// The order was cancelled.
    OrderCancelled(OrderCancelled),
    /// The order expired.
    OrderExpired(OrderExpired),
}

/// Domain event envelope for the Overage Purchase context.
#[derive(Debug, Clone)]
pub struct PurchaseEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: PurchaseEventKind,
}

impl PurchaseEventKind {
    /// The persisted type name of this payload.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::OrderQuoted(_) => ORDER_QUOTED,
            Self::PaymentRequested(_) => PAYMENT_REQUESTED,
            Self::PaymentIssued(_) => PAYMENT_ISSUED,
            Self::PaymentFailed(_) => PAYMENT_FAILED,
            Self::PaymentSettled(_) => PAYMENT_SETTLED,
            Self::CapacityApplied(_) => CAPACITY_APPLIED,
            Self::OrderCancelled(_) => ORDER_CANCELLED,
            Self::OrderExpired(_) => ORDER_EXPIRED,
        }
    }
}

impl DomainEvent for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("PurchaseEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
