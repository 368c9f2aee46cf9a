//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type shared by every bounded context.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No storage account exists for the event.
    #[error("event not found: {0}")]
    EventNotFound(Uuid),

    /// The plan catalog has no plan with this identifier.
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// No purchase order exists with this identifier.
    #[error("purchase order not found: {0}")]
    OrderNotFound(Uuid),

    /// Requested additional storage is below the current overage or out of range.
    #[error("invalid requested storage: {requested} GB (minimum {minimum} GB)")]
    InvalidRequestedStorage {
        /// The requested amount, as submitted.
        requested: String,
        /// The smallest acceptable amount at quote time.
        minimum: u64,
    },

    /// Installment count outside `[1, max]` or not allowed for the payment method.
    #[error("invalid installment count: {count} (allowed 1..={max})")]
    InvalidInstallmentCount {
        /// The requested installment count.
        count: u32,
        /// The largest count allowed in this context.
        max: u32,
    },

    /// The payment gateway failed after all retry attempts.
    #[error("payment gateway error: {0}")]
    PaymentGateway(String),

    /// A settlement notification was already processed for this order.
    #[error("duplicate settlement for order {0}")]
    DuplicateSettlement(Uuid),

    /// A transition was requested that the order's current state does not allow.
    #[error("state conflict on order {order_id}: {reason}")]
    StateConflict {
        /// The order whose state rejected the transition.
        order_id: Uuid,
        /// Human-readable description of the conflict.
        reason: String,
    },

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for failures worth retrying in the background
    /// (infrastructure hiccups and lost optimistic-concurrency races).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Infrastructure(_) | Self::ConcurrencyConflict { .. } | Self::PaymentGateway(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_and_gateway_errors_are_transient() {
        assert!(DomainError::Infrastructure("db down".into()).is_transient());
        assert!(DomainError::PaymentGateway("timeout".into()).is_transient());
        assert!(
            DomainError::ConcurrencyConflict {
                aggregate_id: Uuid::new_v4(),
                expected: 1,
                actual: 2,
            }
            .is_transient()
        );
    }

    #[test]
    fn test_validation_errors_are_not_transient() {
        assert!(!DomainError::Validation("bad".into()).is_transient());
        assert!(
            !DomainError::InvalidInstallmentCount { count: 0, max: 12 }.is_transient()
        );
        assert!(!DomainError::EventNotFound(Uuid::new_v4()).is_transient());
    }

    #[test]
    fn test_invalid_requested_storage_message_names_minimum() {
        let err = DomainError::InvalidRequestedStorage {
            requested: "1.5".to_owned(),
            minimum: 2,
        };
        assert_eq!(
            err.to_string(),
            "invalid requested storage: 1.5 GB (minimum 2 GB)"
        );
    }
}
