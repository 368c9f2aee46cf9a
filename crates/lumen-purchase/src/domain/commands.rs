//! Commands for the Overage Purchase context.

use lumen_core::command::Command;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::status::PaymentMethod;

/// Command to price additional storage for an event as a draft order.
#[derive(Debug, Clone)]
pub struct QuoteOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Identifier for the new order.
    pub order_id: Uuid,
    /// The event being topped up.
    pub event_id: Uuid,
    /// Requested additional storage in GB.
    pub requested_gb: Decimal,
    /// Number of installments.
    pub installment_count: u32,
}

impl Command for QuoteOrder {
    fn command_type(&self) -> &'static str {
        "purchase.quote_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

/// Command to confirm a draft order and request payment.
#[derive(Debug, Clone)]
pub struct ConfirmOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The order to confirm.
    pub order_id: Uuid,
    /// Payment method.
    pub payment_method: PaymentMethod,
}

impl Command for ConfirmOrder {
    fn command_type(&self) -> &'static str {
        "purchase.confirm_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

/// Command carrying a settlement notification from the gateway.
#[derive(Debug, Clone)]
pub struct SettlePayment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The settled order.
    pub order_id: Uuid,
    /// The gateway's payment reference.
    pub external_ref: String,
}

impl Command for SettlePayment {
    fn command_type(&self) -> &'static str {
        "purchase.settle_payment"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

/// Command to apply the capacity of a paid order.
#[derive(Debug, Clone)]
pub struct ApplyPaidOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The paid order.
    pub order_id: Uuid,
}

impl Command for ApplyPaidOrder {
    fn command_type(&self) -> &'static str {
        "purchase.apply_paid_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}

/// Command to cancel an unpaid order.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The order to cancel.
    pub order_id: Uuid,
}

impl Command for CancelOrder {
    fn command_type(&self) -> &'static str {
        "purchase.cancel_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> Uuid {
        self.order_id
    }
}
