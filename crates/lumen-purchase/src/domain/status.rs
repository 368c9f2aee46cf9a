//! Order lifecycle states and payment methods.

use std::fmt;
use std::str::FromStr;

use lumen_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Quoted, not yet confirmed.
    Draft,
    /// Confirmed; waiting for the gateway to settle.
    PendingPayment,
    /// Settled; capacity not yet applied.
    Paid,
    /// Capacity applied to the event.
    Applied,
    /// Cancelled before payment.
    Cancelled,
    /// Payment window elapsed.
    Expired,
}

impl OrderStatus {
    /// Terminal orders never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Applied | Self::Cancelled | Self::Expired)
    }

    /// Lowercase name used in views and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Applied => "applied",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the organizer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Instant bank transfer; always a single installment.
    Pix,
    /// Card, optionally in installments.
    CreditCard,
}

impl PaymentMethod {
    /// Largest installment count the method accepts, given the configured
    /// maximum.
    #[must_use]
    pub const fn max_installments(self, configured_max: u32) -> u32 {
        match self {
            Self::Pix => 1,
            Self::CreditCard => configured_max,
        }
    }

    /// Lowercase name used in views and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::CreditCard => "credit_card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pix" => Ok(Self::Pix),
            "credit_card" => Ok(Self::CreditCard),
            other => Err(DomainError::Validation(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}
