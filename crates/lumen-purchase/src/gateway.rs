//! Payment gateway port.
//!
//! The workflow only needs to create a payment; settlement arrives later as
//! a notification keyed by order id and external reference. The sandbox
//! implementation stands in for a real provider.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use lumen_billing::Money;
use lumen_core::error::DomainError;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::status::PaymentMethod;

/// A request to collect payment for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// The order being paid.
    pub order_id: Uuid,
    /// Key the gateway uses to de-duplicate repeated requests.
    pub idempotency_key: String,
    /// Total amount to collect.
    pub amount: Money,
    /// Number of installments.
    pub installment_count: u32,
    /// Payment method.
    pub method: PaymentMethod,
}

/// The gateway's handle for a created payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentHandle {
    /// Gateway reference; settlement notifications carry it.
    pub external_ref: String,
    /// Code shown to the payer.
    pub payment_code: String,
}

/// Errors raised by a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway could not be reached or answered with a server error.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway did not answer in time.
    #[error("payment gateway timed out")]
    Timeout,

    /// The gateway refused the request; retrying will not help.
    #[error("payment rejected: {0}")]
    Rejected(String),
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::Unavailable(_) | GatewayError::Timeout => {
                DomainError::PaymentGateway(err.to_string())
            }
            GatewayError::Rejected(_) => DomainError::Validation(err.to_string()),
        }
    }
}

/// Port to the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment. Repeating a request with the same idempotency key
    /// returns the original handle.
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError>;
}

/// In-process gateway that accepts every request.
///
/// Handles are derived from the idempotency key, so a repeated request
/// returns the original handle. `fail_next` injects transient outages.
#[derive(Debug, Default)]
pub struct SandboxPaymentGateway {
    issued: Mutex<HashMap<String, PaymentHandle>>,
    pending_failures: Mutex<u32>,
    calls: Mutex<u32>,
}

impl SandboxPaymentGateway {
    /// Creates a sandbox gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls fail as unavailable.
    pub fn fail_next(&self, count: u32) {
        *self
            .pending_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = count;
    }

    /// Number of `create_payment` calls received, failed ones included.
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of distinct payments issued.
    pub fn issued_count(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl PaymentGateway for SandboxPaymentGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        {
            let mut failures = self
                .pending_failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *failures > 0 {
                *failures -= 1;
                return Err(GatewayError::Unavailable("sandbox outage".to_owned()));
            }
        }
        if request.amount.is_negative() {
            return Err(GatewayError::Rejected("negative amount".to_owned()));
        }

        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = issued
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| {
                let short: String = request.idempotency_key.chars().take(16).collect();
                let payment_code = match request.method {
                    PaymentMethod::Pix => format!("PIX-{short}-{}", request.amount.minor_units()),
                    PaymentMethod::CreditCard => {
                        format!("CARD-{short}-{}x", request.installment_count)
                    }
                };
                PaymentHandle {
                    external_ref: format!("sbx_{short}"),
                    payment_code,
                }
            })
            .clone();
        debug!(order_id = %request.order_id, external_ref = %handle.external_ref, "sandbox payment created");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> PaymentRequest {
        PaymentRequest {
            order_id: Uuid::new_v4(),
            idempotency_key: key.to_owned(),
            amount: Money::from_minor(500),
            installment_count: 1,
            method: PaymentMethod::Pix,
        }
    }

    #[tokio::test]
    async fn test_same_key_returns_same_handle() {
        let gateway = SandboxPaymentGateway::new();

        let first = gateway.create_payment(&request("abcdef0123456789ff")).await.unwrap();
        let second = gateway.create_payment(&request("abcdef0123456789ff")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.external_ref, "sbx_abcdef0123456789");
        assert_eq!(gateway.issued_count(), 1);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_injected_outage_is_transient() {
        let gateway = SandboxPaymentGateway::new();
        gateway.fail_next(1);

        let err = gateway.create_payment(&request("k")).await.unwrap_err();
        let domain: DomainError = err.into();

        assert!(domain.is_transient());
        assert!(gateway.create_payment(&request("k")).await.is_ok());
    }

    #[test]
    fn test_rejection_is_not_transient() {
        let domain: DomainError = GatewayError::Rejected("card declined".to_owned()).into();

        assert!(!domain.is_transient());
    }
}
