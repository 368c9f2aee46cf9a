//! Pricing of additional storage.
//!
//! Price = requested GB × price per GB, rounded half-up to cents. The price
//! is linear in the requested amount up to one cent of rounding.

use lumen_core::error::DomainError;
use rust_decimal::Decimal;
use tracing::debug;

use crate::money::Money;
use crate::settings::PricingSettings;

/// Upper bound on a single storage purchase.
pub const MAX_REQUESTED_GB: u64 = 100_000;

fn invalid_request(requested_gb: Decimal, minimum_gb: u64) -> DomainError {
    DomainError::InvalidRequestedStorage {
        requested: requested_gb.normalize().to_string(),
        minimum: minimum_gb,
    }
}

/// Checks a requested top-up against the event's current minimum purchase
/// (`ceil(overage)` in whole GB).
///
/// # Errors
///
/// Returns `DomainError::InvalidRequestedStorage` when the request is not
/// positive, below `minimum_gb`, or above [`MAX_REQUESTED_GB`].
pub fn validate_requested_storage(requested_gb: Decimal, minimum_gb: u64) -> Result<(), DomainError> {
    if requested_gb <= Decimal::ZERO
        || requested_gb < Decimal::from(minimum_gb)
        || requested_gb > Decimal::from(MAX_REQUESTED_GB)
    {
        return Err(invalid_request(requested_gb, minimum_gb));
    }
    Ok(())
}

/// Prices `requested_gb` at `price_per_gb`.
///
/// # Errors
///
/// Returns `DomainError::InvalidRequestedStorage` for a negative amount and
/// `DomainError::Validation` for a negative price or an unrepresentable
/// result.
pub fn quote(requested_gb: Decimal, price_per_gb: Decimal) -> Result<Money, DomainError> {
    if requested_gb.is_sign_negative() {
        return Err(invalid_request(requested_gb, 0));
    }
    if price_per_gb.is_sign_negative() {
        return Err(DomainError::Validation(
            "price per GB must not be negative".to_owned(),
        ));
    }
    let amount = requested_gb
        .checked_mul(price_per_gb)
        .ok_or_else(|| DomainError::Validation("storage price overflow".to_owned()))?;
    Money::from_decimal(amount)
}

/// Validates a top-up against the minimum purchase and prices it with the
/// configured rate.
///
/// # Errors
///
/// See [`validate_requested_storage`] and [`quote`].
pub fn quote_overage(
    requested_gb: Decimal,
    minimum_gb: u64,
    settings: &PricingSettings,
) -> Result<Money, DomainError> {
    validate_requested_storage(requested_gb, minimum_gb)?;
    let price = quote(requested_gb, settings.price_per_gb)?;
    debug!(%requested_gb, minimum_gb, %price, "priced storage top-up");
    Ok(price)
}
