//! Lumen — Billing context.
//!
//! Pure, synchronous calculators for pricing additional storage and for
//! splitting a price into a compound-interest installment schedule. All
//! amounts are integer minor units ([`Money`]); rates and per-GB prices are
//! fixed-point decimals.

pub mod installments;
pub mod money;
pub mod pricing;
pub mod settings;

pub use installments::{InstallmentSchedule, installment_options, schedule};
pub use money::Money;
pub use pricing::{MAX_REQUESTED_GB, quote, quote_overage, validate_requested_storage};
pub use settings::PricingSettings;
